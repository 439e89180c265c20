use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use natter_db::Database;
use natter_types::models::{City, Identity};

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};

/// Read-only lookup over the city table.
#[derive(Clone)]
pub struct CityDirectory {
    db: Arc<Database>,
}

impl CityDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn lookup(&self, name: &str) -> Result<City, ApiError> {
        let row = self
            .db
            .get_city_by_name(name)
            .map_err(ApiError::StorageFailure)?
            .ok_or(ApiError::NotFound)?;

        Ok(City {
            id: row.id,
            name: row.name,
            country_code: row.country_code,
            district: row.district,
            population: row.population,
        })
    }
}

pub async fn get_city(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
    Extension(_identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let city = run_blocking(move || state.cities.lookup(&city_name)).await?;
    Ok(Json(city))
}
