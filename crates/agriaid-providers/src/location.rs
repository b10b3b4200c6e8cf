//! Where the farmer is: a place name, optional coordinates, optional region.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinates '{0}' (expected LAT,LON in decimal degrees)")]
pub struct InvalidCoordinates(pub String);

impl FromStr for Coordinates {
    type Err = InvalidCoordinates;

    /// `LAT,LON`, e.g. `14.6,121.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidCoordinates(s.trim().to_string());
        let (lat, lon) = s.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(invalid());
        }
        Ok(Self::new(lat, lon))
    }
}

/// Fallback point used whenever the user did not give coordinates.
pub const MANILA: Coordinates = Coordinates::new(14.5995, 120.9842);

/// Philippine administrative regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Ncr,
    Car,
    Ilocos,
    CagayanValley,
    CentralLuzon,
    Calabarzon,
    Mimaropa,
    Bicol,
    WesternVisayas,
    CentralVisayas,
    EasternVisayas,
    Zamboanga,
    NorthernMindanao,
    Davao,
    Soccsksargen,
    Caraga,
    Barmm,
}

impl Region {
    pub const ALL: [Region; 17] = [
        Region::Ncr,
        Region::Car,
        Region::Ilocos,
        Region::CagayanValley,
        Region::CentralLuzon,
        Region::Calabarzon,
        Region::Mimaropa,
        Region::Bicol,
        Region::WesternVisayas,
        Region::CentralVisayas,
        Region::EasternVisayas,
        Region::Zamboanga,
        Region::NorthernMindanao,
        Region::Davao,
        Region::Soccsksargen,
        Region::Caraga,
        Region::Barmm,
    ];

    /// Official short code (`NCR`, `IV-A`, `XIII`, ...).
    pub fn code(self) -> &'static str {
        match self {
            Region::Ncr => "NCR",
            Region::Car => "CAR",
            Region::Ilocos => "I",
            Region::CagayanValley => "II",
            Region::CentralLuzon => "III",
            Region::Calabarzon => "IV-A",
            Region::Mimaropa => "IV-B",
            Region::Bicol => "V",
            Region::WesternVisayas => "VI",
            Region::CentralVisayas => "VII",
            Region::EasternVisayas => "VIII",
            Region::Zamboanga => "IX",
            Region::NorthernMindanao => "X",
            Region::Davao => "XI",
            Region::Soccsksargen => "XII",
            Region::Caraga => "XIII",
            Region::Barmm => "BARMM",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Region::Ncr => "Metro Manila",
            Region::Car => "Cordillera",
            Region::Ilocos => "Ilocos",
            Region::CagayanValley => "Cagayan Valley",
            Region::CentralLuzon => "Central Luzon",
            Region::Calabarzon => "CALABARZON",
            Region::Mimaropa => "MIMAROPA",
            Region::Bicol => "Bicol",
            Region::WesternVisayas => "Western Visayas",
            Region::CentralVisayas => "Central Visayas",
            Region::EasternVisayas => "Eastern Visayas",
            Region::Zamboanga => "Zamboanga Peninsula",
            Region::NorthernMindanao => "Northern Mindanao",
            Region::Davao => "Davao",
            Region::Soccsksargen => "SOCCSKSARGEN",
            Region::Caraga => "Caraga",
            Region::Barmm => "Bangsamoro",
        }
    }

    /// Representative point used for region-level weather.
    pub fn coordinates(self) -> Coordinates {
        match self {
            Region::Ncr => Coordinates::new(14.5995, 120.9842),
            Region::Car => Coordinates::new(16.4023, 120.5960),
            Region::Ilocos => Coordinates::new(16.0934, 120.3320),
            Region::CagayanValley => Coordinates::new(16.9754, 121.8107),
            Region::CentralLuzon => Coordinates::new(15.4800, 120.7100),
            Region::Calabarzon => Coordinates::new(14.1008, 121.0794),
            Region::Mimaropa => Coordinates::new(13.0563, 121.0543),
            Region::Bicol => Coordinates::new(13.4215, 123.4137),
            Region::WesternVisayas => Coordinates::new(11.0050, 122.5378),
            Region::CentralVisayas => Coordinates::new(10.3157, 123.8854),
            Region::EasternVisayas => Coordinates::new(11.2504, 125.0076),
            Region::Zamboanga => Coordinates::new(8.4869, 123.8083),
            Region::NorthernMindanao => Coordinates::new(8.4542, 124.6319),
            Region::Davao => Coordinates::new(7.0731, 125.6128),
            Region::Soccsksargen => Coordinates::new(6.9214, 124.8458),
            Region::Caraga => Coordinates::new(8.9476, 125.5406),
            Region::Barmm => Coordinates::new(7.2045, 124.2302),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Region '{0}' not found. Use: NCR, CAR, I-XIII, BARMM")]
pub struct UnknownRegion(pub String);

impl FromStr for Region {
    type Err = UnknownRegion;

    /// Accepts the short code or the display name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Region::ALL
            .into_iter()
            .find(|r| {
                r.code().eq_ignore_ascii_case(wanted) || r.display_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownRegion(wanted.to_string()))
    }
}

/// The farmer's location for one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub region: Option<Region>,
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coordinates: None,
            region: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn resolved_coordinates(&self) -> Coordinates {
        self.coordinates.unwrap_or(MANILA)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::named("Manila")
    }
}
