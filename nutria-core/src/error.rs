use thiserror::Error;

#[derive(Error, Debug)]
pub enum NutriaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Model error: {0}")]
    Model(#[from] crate::inference::ModelError),

    #[error("Diet plan error: {0}")]
    DietPlan(#[from] crate::dietplan::DietPlanError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data integrity error: {0}")]
    Integrity(String),
}
