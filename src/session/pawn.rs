//! The trait user types implement to be stored by a session.
#![forbid(unsafe_code)]

use crate::model::PawnDescriptor;
use crate::types::{Record, Result};

/// A Rust type stored as a pawn.
///
/// `to_record` yields one entry per declared property; the primary key is
/// never part of it because the session keeps identities beside the value.
/// `from_record` receives storage rows and must tolerate the extra `Id`
/// column.
///
/// ```
/// use pawnstore::model::{PawnDescriptor, PropertyDescriptor, PropertyType};
/// use pawnstore::session::Pawn;
/// use pawnstore::types::{Record, Result};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Car {
///     model: String,
///     doors: i64,
/// }
///
/// impl Pawn for Car {
///     const NAME: &'static str = "Car";
///
///     fn descriptor() -> PawnDescriptor {
///         PawnDescriptor::new(Self::NAME)
///             .property(PropertyDescriptor::new("Model", PropertyType::String))
///             .property(PropertyDescriptor::new("Doors", PropertyType::Int32))
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new()
///             .with("Model", self.model.as_str())
///             .with("Doors", self.doors)
///     }
///
///     fn from_record(record: &Record) -> Result<Self> {
///         Ok(Self {
///             model: record.get_str("Model")?.to_owned(),
///             doors: record.get_i64("Doors")?,
///         })
///     }
/// }
///
/// let car = Car { model: "T".into(), doors: 4 };
/// assert_eq!(Car::from_record(&car.to_record()).unwrap(), car);
/// ```
pub trait Pawn: Clone + 'static {
    /// Logical pawn name; must match [`Pawn::descriptor`].
    const NAME: &'static str;

    /// Declared properties and relation fields.
    fn descriptor() -> PawnDescriptor;

    /// Property values keyed by property name.
    fn to_record(&self) -> Record;

    /// Rebuilds a value from a stored or staged row.
    fn from_record(record: &Record) -> Result<Self>;
}
