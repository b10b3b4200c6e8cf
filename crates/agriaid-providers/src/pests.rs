//! Pests: a static Philippine pest knowledge base plus iNaturalist
//! observations and taxon lookup.

use serde::{Deserialize, Serialize};

use crate::crop::Crop;
use crate::location::Coordinates;
use crate::{ContextPayload, ContextProvider, ContextSource, FetchRequest, HttpFetcher};
use crate::{ProviderError, ProviderResult};

pub const INATURALIST_OBSERVATIONS_URL: &str = "https://api.inaturalist.org/v1/observations";
pub const INATURALIST_TAXA_URL: &str = "https://api.inaturalist.org/v1/taxa/autocomplete";

/// iNaturalist taxon id for class Insecta.
const INSECTA_TAXON_ID: u32 = 47158;
const OBSERVATION_RADIUS_KM: u32 = 50;
const OBSERVATIONS_PER_PAGE: u32 = 10;

// ============================================================================
// Knowledge base
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PestProfile {
    pub name: &'static str,
    pub symptoms: &'static str,
    pub control: &'static str,
}

/// What we know about one crop's pests. Rice and corn carry detailed
/// profiles; vegetables only carry name lists.
#[derive(Debug, PartialEq, Serialize)]
pub struct CropPestSheet {
    pub crop: Crop,
    pub pests: &'static [PestProfile],
    pub common_pests: &'static [&'static str],
    pub diseases: &'static [&'static str],
    /// Prevention for detailed sheets, general control for the others.
    pub advice: &'static str,
}

static RICE: CropPestSheet = CropPestSheet {
    crop: Crop::Rice,
    pests: &[
        PestProfile {
            name: "Rice Black Bug (Scotinophara coarctata)",
            symptoms: "Yellowing and drying of plants",
            control: "Remove weeds, use insecticides, handpick bugs",
        },
        PestProfile {
            name: "Rice Tungro Disease",
            symptoms: "Yellow-orange leaves, stunted growth",
            control: "Plant resistant varieties, control leafhoppers",
        },
        PestProfile {
            name: "Rice Blast (Pyricularia oryzae)",
            symptoms: "Diamond-shaped lesions on leaves",
            control: "Use resistant varieties, apply fungicides",
        },
    ],
    common_pests: &[],
    diseases: &[],
    advice: "Use certified seeds, proper spacing, balanced fertilization",
};

static CORN: CropPestSheet = CropPestSheet {
    crop: Crop::Corn,
    pests: &[
        PestProfile {
            name: "Corn Borer (Ostrinia furnacalis)",
            symptoms: "Holes in leaves, broken tassels",
            control: "Bt corn varieties, early planting, crop rotation",
        },
        PestProfile {
            name: "Fall Armyworm (Spodoptera frugiperda)",
            symptoms: "Irregular holes in leaves, damaged whorl",
            control: "Scout regularly, use appropriate insecticides",
        },
    ],
    common_pests: &[],
    diseases: &[],
    advice: "Early planting, remove crop residues, use pheromone traps",
};

static VEGETABLES: CropPestSheet = CropPestSheet {
    crop: Crop::Vegetables,
    pests: &[],
    common_pests: &["Aphids", "Whiteflies", "Fruit flies", "Leaf miners"],
    diseases: &["Bacterial wilt", "Downy mildew", "Anthracnose"],
    advice: "Crop rotation, proper sanitation, integrated pest management",
};

static ALL_SHEETS: [&CropPestSheet; 3] = [&RICE, &CORN, &VEGETABLES];

pub fn pest_sheet(crop: Crop) -> Option<&'static CropPestSheet> {
    ALL_SHEETS.iter().copied().find(|s| s.crop == crop)
}

/// The slice of the knowledge base handed to the model for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PestDatabase {
    pub sheets: Vec<&'static CropPestSheet>,
}

impl PestDatabase {
    /// One crop's sheet when we have it, otherwise everything.
    pub fn for_crop(crop: Option<Crop>) -> Self {
        match crop.and_then(pest_sheet) {
            Some(sheet) => Self {
                sheets: vec![sheet],
            },
            None => Self {
                sheets: ALL_SHEETS.to_vec(),
            },
        }
    }

    /// Detailed profiles across the selected sheets, in sheet order.
    pub fn profiles(&self) -> impl Iterator<Item = &'static PestProfile> + '_ {
        self.sheets.iter().flat_map(|s| s.pests.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

pub struct PestKnowledgeProvider;

impl ContextProvider for PestKnowledgeProvider {
    fn source(&self) -> ContextSource {
        ContextSource::PestDatabase
    }

    fn fetch(&self, request: &FetchRequest) -> ProviderResult {
        Ok(Some(ContextPayload::PestDatabase(PestDatabase::for_crop(
            request.crop,
        ))))
    }
}

// ============================================================================
// iNaturalist
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PestObservation {
    pub species: String,
    pub common_name: String,
    pub observed_on: Option<String>,
    pub location: String,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonSummary {
    pub name: String,
    pub common_name: Option<String>,
    pub observations: u64,
    pub photo: Option<String>,
    pub wikipedia_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InatTaxon {
    name: String,
    #[serde(default)]
    preferred_common_name: Option<String>,
    #[serde(default)]
    observations_count: u64,
    #[serde(default)]
    default_photo: Option<InatPhoto>,
    #[serde(default)]
    wikipedia_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InatPhoto {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    medium_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InatObservation {
    #[serde(default)]
    taxon: Option<InatTaxon>,
    #[serde(default)]
    observed_on: Option<String>,
    #[serde(default)]
    place_guess: Option<String>,
    #[serde(default)]
    photos: Vec<InatPhoto>,
}

#[derive(Debug, Deserialize)]
struct InatPage<T> {
    results: Vec<T>,
}

fn to_observation(raw: InatObservation) -> Option<PestObservation> {
    let taxon = raw.taxon?;
    Some(PestObservation {
        species: taxon.name,
        common_name: taxon
            .preferred_common_name
            .unwrap_or_else(|| "Unknown".to_string()),
        observed_on: raw.observed_on,
        location: raw.place_guess.unwrap_or_else(|| "Unknown".to_string()),
        photo: raw.photos.into_iter().next().and_then(|p| p.url),
    })
}

/// iNaturalist public API. Free, no key.
#[derive(Debug, Clone)]
pub struct INaturalistClient {
    fetcher: HttpFetcher,
    observations_url: String,
    taxa_url: String,
}

impl INaturalistClient {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            observations_url: INATURALIST_OBSERVATIONS_URL.to_string(),
            taxa_url: INATURALIST_TAXA_URL.to_string(),
        }
    }

    pub fn with_endpoints(
        mut self,
        observations: impl Into<String>,
        taxa: impl Into<String>,
    ) -> Self {
        self.observations_url = observations.into();
        self.taxa_url = taxa.into();
        self
    }

    /// Recent research-grade insect sightings around a point, newest first.
    pub fn observations(&self, at: Coordinates) -> Result<Vec<PestObservation>, ProviderError> {
        let query = [
            ("lat", at.latitude.to_string()),
            ("lng", at.longitude.to_string()),
            ("radius", OBSERVATION_RADIUS_KM.to_string()),
            ("taxon_id", INSECTA_TAXON_ID.to_string()),
            ("quality_grade", "research".to_string()),
            ("per_page", OBSERVATIONS_PER_PAGE.to_string()),
            ("order_by", "created_at".to_string()),
        ];
        let page: InatPage<InatObservation> =
            self.fetcher.get_json(&self.observations_url, &query)?;
        Ok(page.results.into_iter().filter_map(to_observation).collect())
    }

    /// Best species/genus match for a free-text pest name.
    pub fn search_taxon(&self, name: &str) -> Result<Option<TaxonSummary>, ProviderError> {
        let query = [("q", name.to_string()), ("rank", "species,genus".to_string())];
        let page: InatPage<InatTaxon> = self.fetcher.get_json(&self.taxa_url, &query)?;
        Ok(page.results.into_iter().next().map(|t| TaxonSummary {
            name: t.name,
            common_name: t.preferred_common_name,
            observations: t.observations_count,
            photo: t.default_photo.and_then(|p| p.medium_url),
            wikipedia_url: t.wikipedia_url,
        }))
    }
}

pub struct PestObservationProvider {
    client: INaturalistClient,
}

impl PestObservationProvider {
    pub fn new(client: INaturalistClient) -> Self {
        Self { client }
    }
}

impl ContextProvider for PestObservationProvider {
    fn source(&self) -> ContextSource {
        ContextSource::PestObservations
    }

    fn fetch(&self, request: &FetchRequest) -> ProviderResult {
        let found = self.client.observations(request.coordinates)?;
        Ok((!found.is_empty()).then_some(ContextPayload::PestObservations(found)))
    }
}
