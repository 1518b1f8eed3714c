//! The referencing object model: units, axes, ellipsoids, datums and CRS.

pub mod crs;
pub mod cs;
pub mod datum;
pub mod ellipsoid;
pub mod units;

pub use crs::{
    single_components, BaseConversion, CompoundCrs, Crs, DerivedCrs, EngineeringCrs, GeocentricCrs,
    GeographicCrs, ProjectedCrs, TemporalCrs, VerticalCrs,
};
pub use cs::{Axis, AxisDirection, CoordinateSystem};
pub use datum::{
    BursaWolfParameters, DatumRef, EngineeringDatum, GeodeticDatum, TemporalDatum, VerticalDatum,
    VerticalDatumType,
};
pub use ellipsoid::{Ellipsoid, PrimeMeridian};
pub use units::{Unit, UnitKind};
