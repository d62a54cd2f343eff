/// Cities polled by the ingestion job.
///
/// This registry is the single source of truth for the city list: the
/// scheduler iterates it and any dashboard consumer should read it from
/// here rather than keeping its own copy. City identity is not stored with
/// readings; consumers match readings back to a city by nearest
/// coordinates.

/// Metadata for a single polled city.
pub struct City {
    pub name: &'static str,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

/// All cities covered by the scheduled ingestion batch.
pub static CITY_REGISTRY: &[City] = &[
    City {
        name: "Budapest",
        latitude: 47.4979,
        longitude: 19.0402,
    },
    City {
        name: "Vienna",
        latitude: 48.2082,
        longitude: 16.3738,
    },
    City {
        name: "Berlin",
        latitude: 52.5200,
        longitude: 13.4050,
    },
    City {
        name: "Pécs",
        latitude: 46.0727,
        longitude: 18.2323,
    },
    City {
        name: "Szeged",
        latitude: 46.2530,
        longitude: 20.1414,
    },
];

/// Looks up a city by name. Returns `None` if not found.
pub fn find_city(name: &str) -> Option<&'static City> {
    CITY_REGISTRY.iter().find(|c| c.name == name)
}
