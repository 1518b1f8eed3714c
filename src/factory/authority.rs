//! Operations supplied by an external authority (for example an EPSG
//! database) take precedence over the generic path.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AuthorityError, OperationError};
use crate::operation::CoordinateOperation;
use crate::referencing::Crs;

use super::concat::concatenate_all;
use super::config::{DatumShiftMethod, FactoryConfig};
use super::CoordinateOperationFactory;

/// Source of predefined operations, looked up by CRS authority codes.
pub trait OperationAuthority: Send + Sync {
    /// Candidate operations from `source_code` to `target_code`, best first.
    /// An empty list means the authority knows no such operation.
    fn lookup_by_codes(
        &self,
        source_code: &str,
        target_code: &str,
    ) -> Result<Vec<Arc<CoordinateOperation>>, AuthorityError>;
}

/// State of one top-level request, threaded through every recursive step.
#[derive(Debug)]
pub(crate) struct Context {
    pub datum_shift_method: DatumShiftMethod,
    pub lenient: bool,
    /// Code pairs whose authority lookup is under way.
    in_progress: Vec<(String, String)>,
}

impl Context {
    pub fn new(config: &FactoryConfig, datum_shift_method: Option<DatumShiftMethod>) -> Self {
        Self {
            datum_shift_method: datum_shift_method.unwrap_or(config.datum_shift_method),
            lenient: config.lenient_datum_shift,
            in_progress: Vec::new(),
        }
    }

    /// Nested requests made while completing an authority candidate never
    /// consult the authority again.
    pub fn authority_enabled(&self) -> bool {
        self.in_progress.is_empty()
    }
}

impl CoordinateOperationFactory {
    pub(super) fn from_authority(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
    ) -> Option<Arc<CoordinateOperation>> {
        let authority = self.authority.as_ref()?;
        if !ctx.authority_enabled() {
            return None;
        }
        let (source_code, target_code) = (source.identifier()?, target.identifier()?);
        ctx.in_progress.push((source_code.to_owned(), target_code.to_owned()));
        let found = self.search_authority(authority.as_ref(), ctx, source, target);
        ctx.in_progress.pop();
        found
    }

    fn search_authority(
        &self,
        authority: &dyn OperationAuthority,
        ctx: &mut Context,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
    ) -> Option<Arc<CoordinateOperation>> {
        let (source_code, target_code) = (source.identifier()?, target.identifier()?);
        match authority.lookup_by_codes(source_code, target_code) {
            Ok(candidates) => {
                for candidate in candidates {
                    if let Some(op) = self.complete(ctx, source, target, candidate) {
                        debug!(source = source_code, target = target_code, "authority operation");
                        return Some(op);
                    }
                }
            }
            Err(err) => warn!(source = source_code, target = target_code, error = %err, "authority lookup failed"),
        }
        match authority.lookup_by_codes(target_code, source_code) {
            Ok(candidates) => {
                for candidate in candidates {
                    let inverse = match candidate.inverse() {
                        Ok(inverse) => Arc::new(inverse),
                        Err(err) => {
                            debug!(operation = candidate.name(), error = %err, "skipping non-invertible candidate");
                            continue;
                        }
                    };
                    if let Some(op) = self.complete(ctx, source, target, inverse) {
                        debug!(source = source_code, target = target_code, "inverse authority operation");
                        return Some(op);
                    }
                }
            }
            Err(err) => warn!(source = target_code, target = source_code, error = %err, "authority lookup failed"),
        }
        None
    }

    /// Wraps `candidate` with the steps its own CRS need to reach the
    /// requested ones. `None` abandons the candidate.
    fn complete(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
        candidate: Arc<CoordinateOperation>,
    ) -> Option<Arc<CoordinateOperation>> {
        match self.try_complete(ctx, source, target, &candidate) {
            Ok(op) => Some(op),
            Err(err) => {
                debug!(operation = candidate.name(), error = %err, "abandoning authority candidate");
                None
            }
        }
    }

    fn try_complete(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
        candidate: &Arc<CoordinateOperation>,
    ) -> Result<Arc<CoordinateOperation>, OperationError> {
        let prefix = self.create_in(ctx, source, candidate.source_crs())?;
        let suffix = self.create_in(ctx, candidate.target_crs(), target)?;
        concatenate_all(&self.transforms, vec![prefix, Arc::clone(candidate), suffix])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::operation::{OperationKind, DATUM_SHIFT};
    use crate::referencing::{BursaWolfParameters, CoordinateSystem, GeodeticDatum, Unit};
    use crate::transform::MathTransformFactory;

    /// Serves one operation between two codes and records every lookup.
    struct Registry {
        source_code: &'static str,
        target_code: &'static str,
        operation: Option<Arc<CoordinateOperation>>,
        fail: bool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl OperationAuthority for Registry {
        fn lookup_by_codes(
            &self,
            source_code: &str,
            target_code: &str,
        ) -> Result<Vec<Arc<CoordinateOperation>>, AuthorityError> {
            self.calls
                .lock()
                .unwrap()
                .push((source_code.to_owned(), target_code.to_owned()));
            if self.fail {
                return Err(AuthorityError::Lookup("database offline".into()));
            }
            if source_code == self.source_code && target_code == self.target_code {
                return Ok(self.operation.iter().cloned().collect());
            }
            Ok(Vec::new())
        }
    }

    fn ed50() -> GeodeticDatum {
        GeodeticDatum::new("European Datum 1950", crate::referencing::Ellipsoid::INTERNATIONAL_1924)
            .with_bursa_wolf(BursaWolfParameters::translation("WGS84", -87.0, -98.0, -121.0))
    }

    fn ed50_crs(cs: CoordinateSystem) -> Arc<Crs> {
        Arc::new(Crs::geographic("ED50", ed50(), cs).with_identifier("EPSG:4230"))
    }

    fn wgs84() -> Arc<Crs> {
        Arc::new(Crs::wgs84().with_identifier("EPSG:4326"))
    }

    /// A recognizable shift: +1° in longitude, flagged as a transformation.
    fn registered_shift(source: &Arc<Crs>, target: &Arc<Crs>) -> Arc<CoordinateOperation> {
        let transforms = MathTransformFactory::default();
        Arc::new(
            CoordinateOperation::new(
                "ED50 to WGS 84 (registered)",
                Arc::clone(source),
                Arc::clone(target),
                transforms.affine(crate::affine::Matrix::translation(&[1.0, 0.0])),
                OperationKind::Transformation,
            )
            .unwrap()
            .with_accuracy(1.0),
        )
    }

    fn factory(registry: Arc<Registry>) -> CoordinateOperationFactory {
        CoordinateOperationFactory::new(FactoryConfig::default()).with_authority(registry)
    }

    #[test]
    fn test_direct_candidate_is_used() {
        let source = ed50_crs(CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let target = wgs84();
        let registry = Arc::new(Registry {
            source_code: "EPSG:4230",
            target_code: "EPSG:4326",
            operation: Some(registered_shift(&source, &target)),
            fail: false,
            calls: Mutex::new(Vec::new()),
        });
        let op = factory(Arc::clone(&registry)).create_operation(&source, &target).unwrap();
        assert_eq!(op.name(), "ED50 to WGS 84 (registered)");
        assert_eq!(op.accuracy(), Some(1.0));
        assert_eq!(op.transform().transform_points(&[10.0, 50.0]).unwrap(), vec![11.0, 50.0]);
        assert_eq!(registry.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_candidate_is_completed_for_axis_order() {
        let registered_source = ed50_crs(CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let target = wgs84();
        let registry = Arc::new(Registry {
            source_code: "EPSG:4230",
            target_code: "EPSG:4326",
            operation: Some(registered_shift(&registered_source, &target)),
            fail: false,
            calls: Mutex::new(Vec::new()),
        });
        let lat_lon = ed50_crs(CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::DEGREE));
        let op = factory(Arc::clone(&registry)).create_operation(&lat_lon, &target).unwrap();
        assert!(Arc::ptr_eq(op.source_crs(), &lat_lon));
        assert_eq!(op.transform().transform_points(&[50.0, 10.0]).unwrap(), vec![11.0, 50.0]);
        // the completing step is built without asking the authority again
        assert_eq!(registry.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_inverse_candidate() {
        let source = ed50_crs(CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let target = wgs84();
        let registry = Arc::new(Registry {
            source_code: "EPSG:4230",
            target_code: "EPSG:4326",
            operation: Some(registered_shift(&source, &target)),
            fail: false,
            calls: Mutex::new(Vec::new()),
        });
        let op = factory(Arc::clone(&registry)).create_operation(&target, &source).unwrap();
        assert_eq!(op.transform().transform_points(&[11.0, 50.0]).unwrap(), vec![10.0, 50.0]);
        let calls = registry.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ("EPSG:4230".to_owned(), "EPSG:4326".to_owned()));
    }

    #[test]
    fn test_failure_falls_back_to_generic_path() {
        let source = ed50_crs(CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let target = wgs84();
        let registry = Arc::new(Registry {
            source_code: "EPSG:4230",
            target_code: "EPSG:4326",
            operation: None,
            fail: true,
            calls: Mutex::new(Vec::new()),
        });
        let op = factory(Arc::clone(&registry)).create_operation(&source, &target).unwrap();
        assert_eq!(op.name(), DATUM_SHIFT);
        assert_eq!(registry.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_context_guard() {
        let mut ctx = Context::new(&FactoryConfig::default(), Some(DatumShiftMethod::Geocentric));
        assert_eq!(ctx.datum_shift_method, DatumShiftMethod::Geocentric);
        assert!(ctx.authority_enabled());
        ctx.in_progress.push(("EPSG:1".into(), "EPSG:2".into()));
        assert!(!ctx.authority_enabled());
    }
}
