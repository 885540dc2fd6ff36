//! # geotext-types
//!
//! Plain geographic value types shared by the geotext grids.
//!
//! - **Coordinates**: [`coord::Coord`] with the three construction policies in
//!   [`coord::CoordPolicy`] (accept, validate, coerce)
//! - **Boundaries**: [`bbox::BoundingBox`], a southwest/northeast rectangle
//!   that understands the date line
//!
//! All types are serializable with Serde and convert to and from the `geo`
//! crate's primitives.
//!
//! ## Examples
//!
//! ```rust
//! use geotext_types::bbox::BoundingBox;
//! use geotext_types::coord::Coord;
//!
//! let sw = Coord::validated(30.0, -98.0).unwrap();
//! let ne = Coord::validated(31.0, -97.0).unwrap();
//! let region = BoundingBox::new(sw, ne);
//! assert!(region.contains(&Coord::new(30.27, -97.74)));
//! ```

pub mod bbox;
pub mod coord;
