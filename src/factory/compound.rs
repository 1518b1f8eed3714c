//! Operations involving compound CRS, built component by component.

use std::sync::Arc;

use tracing::debug;

use crate::affine::Matrix;
use crate::error::OperationError;
use crate::operation::{CoordinateOperation, AXIS_CHANGES};
use crate::referencing::{single_components, Crs, DatumRef};

use super::authority::Context;
use super::concat::{concatenate, concatenate_all};
use super::CoordinateOperationFactory;

impl CoordinateOperationFactory {
    pub(super) fn compound_operation(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
    ) -> Result<Arc<CoordinateOperation>, OperationError> {
        let sources = single_components(source);
        let targets = single_components(target);
        if let Some(op) = self.through_geodetic_3d(ctx, source, &sources, target, &targets)? {
            return Ok(op);
        }
        if let [single_source] = sources.as_slice() {
            if let Some(op) = self.split_geodetic_3d(ctx, source, single_source, target)? {
                return Ok(op);
            }
        }
        let matched = self.match_components(ctx, &sources, &targets)?;
        self.assemble(source, &sources, target, matched)
    }

    /// Merges a `[geographic 2D, ellipsoidal height]` source into one
    /// geographic 3D CRS when some target component can only be reached
    /// through it. A compound target is then reached by splitting its own
    /// geographic 3D form.
    fn through_geodetic_3d(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        sources: &[Arc<Crs>],
        target: &Arc<Crs>,
        targets: &[Arc<Crs>],
    ) -> Result<Option<Arc<CoordinateOperation>>, OperationError> {
        let needed = |strict| targets.iter().any(|t| needs_geodetic_3d(sources, t, strict));
        if !needed(true) {
            return Ok(None);
        }
        match source.to_geodetic_3d() {
            Some(promoted) => {
                debug!(source = source.name(), "merging into a geographic 3D CRS");
                let promoted = Arc::new(promoted);
                let merge = self.affine_operation(
                    AXIS_CHANGES,
                    source,
                    &promoted,
                    Matrix::identity(promoted.dimension() + 1),
                )?;
                let step = self.create_in(ctx, &promoted, target)?;
                concatenate(&self.transforms, merge, step).map(Some)
            }
            None if needed(false) => {
                Err(OperationError::not_found(format!(
                    "\"{}\" would have to be merged into a geographic 3D CRS, which requires \
                     a geographic 2D CRS followed by an ellipsoidal height",
                    source.name()
                )))
            }
            None => Ok(None),
        }
    }

    /// A geodetic source reaching a promotable `[geographic 2D, ellipsoidal
    /// height]` target goes through the geographic 3D form of the target.
    fn split_geodetic_3d(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        single_source: &Arc<Crs>,
        target: &Arc<Crs>,
    ) -> Result<Option<Arc<CoordinateOperation>>, OperationError> {
        if !matches!(single_source.datum(), Some(DatumRef::Geodetic(_))) || single_source.dimension() < 3 {
            return Ok(None);
        }
        let Some(promoted) = target.to_geodetic_3d() else {
            return Ok(None);
        };
        debug!(target = target.name(), "splitting a geographic 3D CRS");
        let promoted = Arc::new(promoted);
        let step = self.create_in(ctx, source, &promoted)?;
        let split = self.affine_operation(
            AXIS_CHANGES,
            &promoted,
            target,
            Matrix::identity(promoted.dimension() + 1),
        )?;
        concatenate(&self.transforms, step, split).map(Some)
    }

    /// For each target component, the first unused source component that
    /// converts to it, trying the one at the same index first.
    fn match_components(
        &self,
        ctx: &mut Context,
        sources: &[Arc<Crs>],
        targets: &[Arc<Crs>],
    ) -> Result<Vec<(usize, Arc<CoordinateOperation>)>, OperationError> {
        let mut used = vec![false; sources.len()];
        let mut matched = Vec::with_capacity(targets.len());
        for (j, target) in targets.iter().enumerate() {
            let same_index = (j < sources.len()).then_some(j);
            let candidates = same_index.into_iter().chain((0..sources.len()).filter(|&i| i != j));
            let mut first_error = None;
            let mut found = None;
            for i in candidates {
                if used[i] {
                    continue;
                }
                match self.create_in(ctx, &sources[i], target) {
                    Ok(op) => {
                        found = Some((i, op));
                        break;
                    }
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }
            let Some((i, op)) = found else {
                let message = format!("no source component converts to \"{}\"", target.name());
                return Err(match first_error {
                    Some(cause) => OperationError::not_found_caused_by(message, cause),
                    None => OperationError::not_found(message),
                });
            };
            used[i] = true;
            matched.push((i, op));
        }
        Ok(matched)
    }

    /// Selection of the matched source dimensions in target order, then one
    /// pass-through per matched pair.
    fn assemble(
        &self,
        source: &Arc<Crs>,
        sources: &[Arc<Crs>],
        target: &Arc<Crs>,
        matched: Vec<(usize, Arc<CoordinateOperation>)>,
    ) -> Result<Arc<CoordinateOperation>, OperationError> {
        let offsets: Vec<usize> = sources
            .iter()
            .scan(0, |next, c| {
                let offset = *next;
                *next += c.dimension();
                Some(offset)
            })
            .collect();
        let mut components: Vec<Arc<Crs>> = matched.iter().map(|(i, _)| Arc::clone(&sources[*i])).collect();
        let keeps_all = matched.len() == sources.len() && matched.iter().enumerate().all(|(k, (i, _))| k == *i);

        let mut steps = Vec::with_capacity(matched.len() + 1);
        let mut current = if keeps_all {
            Arc::clone(source)
        } else {
            let selected_dim: usize = components.iter().map(|c| c.dimension()).sum();
            let mut matrix = Matrix::zeros(selected_dim, source.dimension());
            let mut row = 0;
            for (i, _) in &matched {
                for d in 0..sources[*i].dimension() {
                    matrix.set(row, offsets[*i] + d, 1.0);
                    row += 1;
                }
            }
            let selected = intermediate_crs(&components);
            steps.push(self.affine_operation(AXIS_CHANGES, source, &selected, matrix)?);
            selected
        };

        let count = matched.len();
        for (k, (_, op)) in matched.into_iter().enumerate() {
            let first_affected: usize = components[..k].iter().map(|c| c.dimension()).sum();
            let num_trailing: usize = components[k + 1..].iter().map(|c| c.dimension()).sum();
            components[k] = Arc::clone(op.target_crs());
            let next = if k + 1 == count {
                Arc::clone(target)
            } else {
                intermediate_crs(&components)
            };
            let step = if first_affected == 0
                && num_trailing == 0
                && Arc::ptr_eq(op.source_crs(), &current)
                && Arc::ptr_eq(op.target_crs(), &next)
            {
                op
            } else {
                let transform = self.transforms.pass_through(first_affected, op.transform(), num_trailing)?;
                Arc::new(CoordinateOperation::pass_through(
                    Arc::clone(&current),
                    Arc::clone(&next),
                    op,
                    first_affected,
                    num_trailing,
                    transform,
                )?)
            };
            steps.push(step);
            current = next;
        }
        concatenate_all(&self.transforms, steps)
    }
}

/// Whether a horizontal + vertical source has to become one geographic 3D
/// CRS to reach `target`. `strict` compares datum names and ellipsoids,
/// otherwise only the figures within a few metres.
fn needs_geodetic_3d(sources: &[Arc<Crs>], target: &Crs, strict: bool) -> bool {
    let Some(target_datum) = target.datum() else {
        return false;
    };
    if !matches!(target_datum, DatumRef::Geodetic(_) | DatumRef::Vertical(_)) {
        return false;
    }
    let datums: Vec<DatumRef<'_>> = sources.iter().filter_map(|c| c.datum()).collect();
    let has_geodetic = datums.iter().any(|d| matches!(d, DatumRef::Geodetic(_)));
    let has_vertical = datums.iter().any(|d| matches!(d, DatumRef::Vertical(_)));
    if !(has_geodetic && has_vertical) {
        return false;
    }
    if target.dimension() >= 3 {
        return true;
    }
    datums.iter().any(|d| {
        std::mem::discriminant(d) == std::mem::discriminant(&target_datum) && !d.matches(&target_datum, strict)
    })
}

fn intermediate_crs(components: &[Arc<Crs>]) -> Arc<Crs> {
    match components {
        [single] => Arc::clone(single),
        _ => {
            let name = components.iter().map(|c| c.name()).collect::<Vec<_>>().join(" + ");
            Arc::new(Crs::compound(&name, components.to_vec()))
        }
    }
}
