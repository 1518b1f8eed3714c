//! Operations between two single CRS.
//!
//! Every builder works through normalized intermediates: geographic
//! coordinates as longitude/latitude in degrees on Greenwich (height in metres
//! up), geocentric coordinates as X/Y/Z in metres. Axis order, units and the
//! prime meridian are handled by affine `Axis changes` steps on either side,
//! which the concatenation then folds into the real work.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::affine::Matrix;
use crate::error::OperationError;
use crate::operation::{
    CoordinateOperation, OperationKind, OperationMethod, AXIS_CHANGES, DATUM_SHIFT_OMITTED_ACCURACY,
    GEOCENTRIC_CONVERSION, TEMPORAL_CONVERSION, VERTICAL_OFFSET,
};
use crate::referencing::{
    AxisDirection, CoordinateSystem, Crs, GeocentricCrs, GeographicCrs, TemporalCrs, Unit,
    VerticalCrs, VerticalDatumType,
};
use crate::transform::provider::{ELLIPSOID_TO_GEOCENTRIC, GEOCENTRIC_TO_ELLIPSOID};
use crate::transform::ParameterValueGroup;

use super::authority::Context;
use super::concat::{concatenate, concatenate3};
use super::datum_shift::{self, DatumShift};
use super::CoordinateOperationFactory;

pub(crate) const VERTICAL_OFFSET_METHOD: &str = "Vertical_Offset";

type OperationResult = Result<Arc<CoordinateOperation>, OperationError>;

impl CoordinateOperationFactory {
    pub(super) fn geographic_to_geographic(
        &self,
        ctx: &Context,
        source: &Arc<Crs>,
        s: &GeographicCrs,
        target: &Arc<Crs>,
        t: &GeographicCrs,
    ) -> OperationResult {
        if s.datum.is_same_datum(&t.datum) {
            return self.geographic_axis_changes(source, s, target, t);
        }
        let shift = datum_shift::resolve(&s.datum, &t.datum, ctx.lenient)?;
        if let Some(method) = ctx.datum_shift_method.provider_name() {
            if shift.parameters.is_translation() {
                return self.molodensky_chain(method, &shift, source, s, target, t);
            }
        }
        debug!(source = %s.name, target = %t.name, "datum shift through geocentric coordinates");
        let source_pivot = GeocentricCrs::normalized(&s.datum);
        let target_pivot = GeocentricCrs::normalized(&t.datum);
        let source_pivot_crs = Arc::new(Crs::Geocentric(source_pivot.clone()));
        let target_pivot_crs = Arc::new(Crs::Geocentric(target_pivot.clone()));
        concatenate3(
            &self.transforms,
            self.ellipsoid_to_geocentric(source, s, &source_pivot_crs, &source_pivot.cs)?,
            self.geocentric_shift(&source_pivot_crs, &source_pivot.cs, &target_pivot_crs, &target_pivot.cs, &shift)?,
            self.geocentric_to_ellipsoid(&target_pivot_crs, &target_pivot.cs, target, t)?,
        )
    }

    /// Same datum: one affine for axis order, units, prime meridian and the
    /// height ordinate (added as zero or dropped).
    fn geographic_axis_changes(
        &self,
        source: &Arc<Crs>,
        s: &GeographicCrs,
        target: &Arc<Crs>,
        t: &GeographicCrs,
    ) -> OperationResult {
        let adapter = height_adapter(s.cs.dimension(), t.cs.dimension());
        let matrix = t
            .normalization()?
            .inverse()?
            .multiply(&adapter.multiply(&s.normalization()?)?)?;
        self.affine_operation(AXIS_CHANGES, source, target, matrix)
    }

    /// normalize source → Molodensky → denormalize target.
    fn molodensky_chain(
        &self,
        method: &str,
        shift: &DatumShift,
        source: &Arc<Crs>,
        s: &GeographicCrs,
        target: &Arc<Crs>,
        t: &GeographicCrs,
    ) -> OperationResult {
        let (source_dim, target_dim) = (s.cs.dimension(), t.cs.dimension());
        let normalized_source = Arc::new(Crs::normalized_geographic(&s.datum, source_dim));
        let normalized_target = Arc::new(Crs::normalized_geographic(&t.datum, target_dim));
        let p = &shift.parameters;
        let params = ParameterValueGroup::new()
            .with("src_dim", source_dim as f64)
            .with("tgt_dim", target_dim as f64)
            .with("dx", p.dx)
            .with("dy", p.dy)
            .with("dz", p.dz)
            .with("src_semi_major", s.datum.ellipsoid.a)
            .with("src_semi_minor", s.datum.ellipsoid.b)
            .with("tgt_semi_major", t.datum.ellipsoid.a)
            .with("tgt_semi_minor", t.datum.ellipsoid.b);
        let (transform, method) = self.transforms.parameterized(method, &params)?;
        trace!(method = %method.name, source_dim, target_dim, "molodensky step");
        let step = CoordinateOperation::new(
            shift.name,
            Arc::clone(&normalized_source),
            Arc::clone(&normalized_target),
            transform,
            OperationKind::Transformation,
        )?
        .with_method(method)
        .with_accuracy(shift.accuracy);
        concatenate3(
            &self.transforms,
            self.affine_operation(AXIS_CHANGES, source, &normalized_source, s.normalization()?)?,
            Arc::new(step),
            self.affine_operation(AXIS_CHANGES, &normalized_target, target, t.normalization()?.inverse()?)?,
        )
    }

    pub(super) fn geographic_to_geocentric(
        &self,
        ctx: &Context,
        source: &Arc<Crs>,
        s: &GeographicCrs,
        target: &Arc<Crs>,
        t: &GeocentricCrs,
    ) -> OperationResult {
        if s.datum.is_same_datum(&t.datum) {
            return self.ellipsoid_to_geocentric(source, s, target, &t.cs);
        }
        let pivot = GeocentricCrs::normalized(&s.datum);
        let pivot_crs = Arc::new(Crs::Geocentric(pivot.clone()));
        concatenate(
            &self.transforms,
            self.ellipsoid_to_geocentric(source, s, &pivot_crs, &pivot.cs)?,
            self.geocentric_to_geocentric(ctx, &pivot_crs, &pivot, target, t)?,
        )
    }

    pub(super) fn geocentric_to_geographic(
        &self,
        ctx: &Context,
        source: &Arc<Crs>,
        s: &GeocentricCrs,
        target: &Arc<Crs>,
        t: &GeographicCrs,
    ) -> OperationResult {
        if s.datum.is_same_datum(&t.datum) {
            return self.geocentric_to_ellipsoid(source, &s.cs, target, t);
        }
        let pivot = GeocentricCrs::normalized(&t.datum);
        let pivot_crs = Arc::new(Crs::Geocentric(pivot.clone()));
        concatenate(
            &self.transforms,
            self.geocentric_to_geocentric(ctx, source, s, &pivot_crs, &pivot)?,
            self.geocentric_to_ellipsoid(&pivot_crs, &pivot.cs, target, t)?,
        )
    }

    pub(super) fn geocentric_to_geocentric(
        &self,
        ctx: &Context,
        source: &Arc<Crs>,
        s: &GeocentricCrs,
        target: &Arc<Crs>,
        t: &GeocentricCrs,
    ) -> OperationResult {
        if s.datum.is_same_datum(&t.datum) {
            let matrix = s.cs.swap_and_scale(&t.cs)?;
            return self.affine_operation(AXIS_CHANGES, source, target, matrix);
        }
        let shift = datum_shift::resolve(&s.datum, &t.datum, ctx.lenient)?;
        self.geocentric_shift(source, &s.cs, target, &t.cs, &shift)
    }

    /// `normalize(target)⁻¹ · shift · normalize(source)`
    fn geocentric_shift(
        &self,
        source: &Arc<Crs>,
        source_cs: &CoordinateSystem,
        target: &Arc<Crs>,
        target_cs: &CoordinateSystem,
        shift: &DatumShift,
    ) -> OperationResult {
        let geocentric = CoordinateSystem::geocentric();
        let matrix = geocentric.swap_and_scale(target_cs)?.multiply(
            &shift
                .parameters
                .to_matrix()
                .multiply(&source_cs.swap_and_scale(&geocentric)?)?,
        )?;
        let op = CoordinateOperation::new(
            shift.name,
            Arc::clone(source),
            Arc::clone(target),
            self.transforms.affine(matrix),
            OperationKind::Transformation,
        )?
        .with_method(shift.method())
        .with_accuracy(shift.accuracy);
        Ok(Arc::new(op))
    }

    fn ellipsoid_to_geocentric(
        &self,
        source: &Arc<Crs>,
        s: &GeographicCrs,
        target: &Arc<Crs>,
        target_cs: &CoordinateSystem,
    ) -> OperationResult {
        let ellipsoid = &s.datum.ellipsoid;
        let params = ParameterValueGroup::new()
            .with("semi_major", ellipsoid.a)
            .with("semi_minor", ellipsoid.b)
            .with("dim", s.cs.dimension() as f64);
        let (conversion, method) = self.transforms.parameterized(ELLIPSOID_TO_GEOCENTRIC, &params)?;
        let normalize = self.transforms.affine(s.normalization()?);
        let denormalize = self
            .transforms
            .affine(CoordinateSystem::geocentric().swap_and_scale(target_cs)?);
        let transform = self.transforms.concatenate(
            &self.transforms.concatenate(&normalize, &conversion)?,
            &denormalize,
        )?;
        let op = CoordinateOperation::new(
            GEOCENTRIC_CONVERSION,
            Arc::clone(source),
            Arc::clone(target),
            transform,
            OperationKind::Conversion,
        )?
        .with_method(method);
        Ok(Arc::new(op))
    }

    fn geocentric_to_ellipsoid(
        &self,
        source: &Arc<Crs>,
        source_cs: &CoordinateSystem,
        target: &Arc<Crs>,
        t: &GeographicCrs,
    ) -> OperationResult {
        let ellipsoid = &t.datum.ellipsoid;
        let params = ParameterValueGroup::new()
            .with("semi_major", ellipsoid.a)
            .with("semi_minor", ellipsoid.b)
            .with("dim", t.cs.dimension() as f64);
        let (conversion, method) = self.transforms.parameterized(GEOCENTRIC_TO_ELLIPSOID, &params)?;
        let normalize = self
            .transforms
            .affine(source_cs.swap_and_scale(&CoordinateSystem::geocentric())?);
        let denormalize = self.transforms.affine(t.normalization()?.inverse()?);
        let transform = self.transforms.concatenate(
            &self.transforms.concatenate(&normalize, &conversion)?,
            &denormalize,
        )?;
        let op = CoordinateOperation::new(
            GEOCENTRIC_CONVERSION,
            Arc::clone(source),
            Arc::clone(target),
            transform,
            OperationKind::Conversion,
        )?
        .with_method(method);
        Ok(Arc::new(op))
    }

    /// Ellipsoidal heights only: there is no geoid model at this layer.
    pub(super) fn geographic_to_vertical(
        &self,
        source: &Arc<Crs>,
        s: &GeographicCrs,
        target: &Arc<Crs>,
        t: &VerticalCrs,
    ) -> OperationResult {
        if t.datum.datum_type != VerticalDatumType::Ellipsoidal {
            return Err(OperationError::not_found(format!(
                "\"{}\" is not an ellipsoidal height; a geoid model would be required",
                t.name
            )));
        }
        if s.cs.dimension() < 3 {
            return Err(OperationError::not_found(format!(
                "\"{}\" has no ellipsoidal height",
                s.name
            )));
        }
        let matrix = s.cs.swap_and_scale(&t.cs)?;
        self.affine_operation(AXIS_CHANGES, source, target, matrix)
    }

    pub(super) fn vertical_to_vertical(
        &self,
        ctx: &Context,
        source: &Arc<Crs>,
        s: &VerticalCrs,
        target: &Arc<Crs>,
        t: &VerticalCrs,
    ) -> OperationResult {
        if s.datum.equals_ignore_metadata(&t.datum) {
            let matrix = s.cs.swap_and_scale(&t.cs)?;
            return self.affine_operation(AXIS_CHANGES, source, target, matrix);
        }
        let (offset, accuracy) = match s.datum.offset_to(&t.datum) {
            Some(offset) => (offset, None),
            None if ctx.lenient => (0.0, Some(DATUM_SHIFT_OMITTED_ACCURACY)),
            None => {
                return Err(OperationError::not_found(format!(
                    "no height offset from \"{}\" to \"{}\"",
                    s.datum.name, t.datum.name
                )))
            }
        };
        let up = CoordinateSystem::vertical(AxisDirection::Up, Unit::METRE);
        let matrix = up.swap_and_scale(&t.cs)?.multiply(
            &Matrix::translation(&[offset]).multiply(&s.cs.swap_and_scale(&up)?)?,
        )?;
        let mut op = CoordinateOperation::new(
            VERTICAL_OFFSET,
            Arc::clone(source),
            Arc::clone(target),
            self.transforms.affine(matrix),
            OperationKind::Transformation,
        )?
        .with_method(OperationMethod::new(VERTICAL_OFFSET_METHOD, 1, 1).with_aliases(&["EPSG:9616"]));
        if let Some(accuracy) = accuracy {
            op = op.with_accuracy(accuracy);
        }
        Ok(Arc::new(op))
    }

    /// Unit change plus the distance between the two origins, counted along
    /// the target axis.
    pub(super) fn temporal_to_temporal(
        &self,
        source: &Arc<Crs>,
        s: &TemporalCrs,
        target: &Arc<Crs>,
        t: &TemporalCrs,
    ) -> OperationResult {
        let axis = t
            .cs
            .axis(0)
            .ok_or_else(|| OperationError::not_found(format!("\"{}\" has no time axis", t.name)))?;
        let seconds = (s.datum.origin - t.datum.origin).num_milliseconds() as f64 / 1000.0;
        let offset = axis.direction.sign() * seconds * Unit::SECOND.factor_to(&axis.unit)?;
        let matrix = Matrix::translation(&[offset]).multiply(&s.cs.swap_and_scale(&t.cs)?)?;
        let name = if offset == 0.0 { AXIS_CHANGES } else { TEMPORAL_CONVERSION };
        self.affine_operation(name, source, target, matrix)
    }

    /// Operation from the base of `target` to `target`, from its stored conversion.
    pub(super) fn conversion_operation(&self, derived: &Arc<Crs>) -> OperationResult {
        let (base, conversion) = derived.as_derived().ok_or_else(|| {
            OperationError::ConstructionFailure(format!("\"{}\" is not a derived CRS", derived.name()))
        })?;
        let kind = match conversion.method.projection {
            Some(projection) => OperationKind::Projection(projection),
            None => OperationKind::Conversion,
        };
        let op = CoordinateOperation::new(
            &conversion.name,
            Arc::clone(base),
            Arc::clone(derived),
            Arc::clone(&conversion.transform),
            kind,
        )?
        .with_method(conversion.method.clone());
        Ok(Arc::new(op))
    }

    /// source → base of target, then the stored conversion.
    pub(super) fn to_derived(&self, ctx: &mut Context, source: &Arc<Crs>, target: &Arc<Crs>) -> OperationResult {
        let conversion = self.conversion_operation(target)?;
        let to_base = self.create_in(ctx, source, conversion.source_crs())?;
        concatenate(&self.transforms, to_base, conversion)
    }

    /// Inverse of the stored conversion, then base of source → target.
    pub(super) fn from_derived(&self, ctx: &mut Context, source: &Arc<Crs>, target: &Arc<Crs>) -> OperationResult {
        let conversion = self.conversion_operation(source)?;
        let inverse = conversion.inverse().map_err(|err| {
            OperationError::not_found_caused_by(
                format!("the conversion defining \"{}\" cannot be inverted", source.name()),
                err,
            )
        })?;
        let from_base = self.create_in(ctx, conversion.source_crs(), target)?;
        concatenate(&self.transforms, Arc::new(inverse), from_base)
    }

    /// Fallback for engineering CRS: matching axes are swapped and scaled,
    /// anything else passes through unchanged.
    pub(super) fn engineering(&self, source: &Arc<Crs>, target: &Arc<Crs>) -> OperationResult {
        let matrix = match (source.coordinate_system(), target.coordinate_system()) {
            (Some(s), Some(t)) => s.swap_and_scale(t).map_err(|err| err.to_string()),
            _ => Err("no coordinate system".to_owned()),
        }
        .unwrap_or_else(|reason| {
            debug!(
                source = source.name(),
                target = target.name(),
                %reason,
                "axes do not match, passing coordinates through unchanged"
            );
            Matrix::identity(source.dimension() + 1)
        });
        self.affine_operation(AXIS_CHANGES, source, target, matrix)
    }

    pub(super) fn affine_operation(
        &self,
        name: &str,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
        matrix: Matrix,
    ) -> OperationResult {
        Ok(Arc::new(CoordinateOperation::new(
            name,
            Arc::clone(source),
            Arc::clone(target),
            self.transforms.affine(matrix),
            OperationKind::Conversion,
        )?))
    }
}

/// Normalized geographic `source_dim` → `target_dim`: height set to zero or dropped.
fn height_adapter(source_dim: usize, target_dim: usize) -> Matrix {
    let mut matrix = Matrix::zeros(target_dim, source_dim);
    for i in 0..source_dim.min(target_dim) {
        matrix.set(i, i, 1.0);
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_adapter() {
        let mut out = [0.0; 3];
        height_adapter(2, 3).transform_point(&[10.0, 20.0], &mut out);
        assert_eq!(out, [10.0, 20.0, 0.0]);
        let mut out = [0.0; 2];
        height_adapter(3, 2).transform_point(&[10.0, 20.0, 30.0], &mut out);
        assert_eq!(out, [10.0, 20.0]);
        assert!(height_adapter(2, 2).is_identity());
    }
}
