pub mod booking;
pub mod flight;
pub mod profile;
pub mod schedule;
pub mod store;

pub use booking::{Booking, BookingStatus, FareType};
pub use flight::{CabinClass, Flight, FlightStatus, Seat, SeatStatus};
pub use profile::{LoyaltyTier, UserProfile};
pub use store::{InventoryStore, StoreError};
