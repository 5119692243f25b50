pub mod directory;
pub mod hospital;
pub mod queue_counter;

pub use directory::{
    directory_from_config, HospitalDirectory, InMemoryHospitalDirectory, SupabaseHospitalDirectory,
};
pub use hospital::HospitalService;
pub use queue_counter::QueueCounter;
