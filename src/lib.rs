//! Coordinate operations between coordinate reference systems.
//!
//! [`CoordinateOperationFactory`] takes a source and a target [`Crs`] and
//! returns the [`CoordinateOperation`] converting coordinates between them:
//! axis swaps and unit changes, datum shifts, map projections, vertical and
//! temporal offsets, and compound CRS handled component by component.

pub mod affine;
pub mod error;
pub mod factory;
pub mod operation;
pub mod proj;
pub mod referencing;
pub mod transform;

pub use error::{AuthorityError, OperationError, TransformError};
pub use factory::{CoordinateOperationFactory, DatumShiftMethod, FactoryConfig, OperationAuthority};
pub use operation::{CoordinateOperation, OperationKind, OperationMethod};
pub use referencing::Crs;
pub use transform::{MathTransform, MathTransformFactory};
