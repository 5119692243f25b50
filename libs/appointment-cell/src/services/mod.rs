pub mod booking;
pub mod calendar;
pub mod code;
pub mod lifecycle;
pub mod locks;
pub mod queue;
pub mod store;
pub mod supabase_store;

pub use booking::AppointmentBookingService;
pub use calendar::ClinicCalendar;
pub use code::{is_valid_code, parse_code, CodeGenerator, CODE_ALPHABET, CODE_LENGTH};
pub use lifecycle::AppointmentLifecycleService;
pub use locks::BucketLocks;
pub use queue::QueuePositionManager;
pub use store::{
    store_from_config, AppointmentStore, InMemoryAppointmentStore, StoreQueueCounter, UpcomingFilter,
};
pub use supabase_store::SupabaseAppointmentStore;
