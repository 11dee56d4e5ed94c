//! Domain types shared by the dialogue and the plan pipeline

mod message;
mod plan;
mod trip;

pub use message::{Message, MessageKind};
pub use plan::{
    AggregatePlan, DayPlan, LocationRecommendation, PackingCategory, PackingItem, PackingList, StageKind, StageOutcome,
    StageReport, TimeSlot,
};
pub use trip::{Field, Season, Slot, TripRequest, TripStatus, TripUpdate};
