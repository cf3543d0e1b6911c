pub mod decision;
pub mod inference;
pub mod model_manager;
