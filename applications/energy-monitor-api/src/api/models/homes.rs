use serde::Serialize;

pub use crate::repositories::homes::{Appliance, Home, Room};

#[derive(Debug, Serialize)]
pub struct HomesListResponse {
    pub homes: Vec<Home>,
}

#[derive(Debug, Serialize)]
pub struct RoomsListResponse {
    pub rooms: Vec<Room>,
}

#[derive(Debug, Serialize)]
pub struct AppliancesListResponse {
    pub appliances: Vec<Appliance>,
}
