pub mod cold_event;
pub mod execution_record;
