use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Serialize, Deserialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::classifier::normalize_text;
use crate::db::{DbHandle, StoreError, EXCLUSIVE_CLAIMS, PROFESSIONALS, encode, decode};

/// Subscription tier levels, highest visibility first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Premium,
    Professional,
    Essential,
}

impl Default for SubscriptionPlan {
    fn default() -> Self {
        Self::Essential
    }
}

impl SubscriptionPlan {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Premium => 3,
            Self::Professional => 2,
            Self::Essential => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Professional => "professional",
            Self::Essential => "essential",
        }
    }
}

impl std::str::FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "premium" => Ok(Self::Premium),
            "professional" => Ok(Self::Professional),
            "essential" => Ok(Self::Essential),
            _ => Err(format!("Unknown subscription plan: {}", s)),
        }
    }
}

/// Visibility rank of a raw plan tag. Listings are external data, so the
/// tag is kept as a string; anything unrecognized sorts below every real
/// tier.
pub fn plan_rank(plan: &str) -> u8 {
    plan.parse::<SubscriptionPlan>().map(|p| p.rank()).unwrap_or(0)
}

/// A professional's marketplace listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Professional {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub subscription_plan: String,
    pub rating: f64,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfessional {
    pub name: String,
    pub specialty: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default = "default_plan")]
    pub subscription_plan: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub is_verified: bool,
}

fn default_plan() -> String {
    SubscriptionPlan::Essential.as_str().to_string()
}

/// An active exclusivity claim: one premium professional holding a
/// `(specialty, neighborhood)` pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExclusiveClaim {
    pub id: String,
    pub professional_id: String,
    pub specialty: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClaim {
    pub professional_id: String,
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("professional not found: {0}")]
    ProfessionalNotFound(String),

    #[error("exclusivity requires the premium plan")]
    PremiumRequired,

    #[error("claim limit reached: {current} of {maximum}")]
    ClaimLimitReached { current: u32, maximum: u32 },

    #[error("{specialty} already has an exclusive professional in {neighborhood}")]
    NeighborhoodTaken { specialty: String, neighborhood: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl IntoResponse for ListingError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::ProfessionalNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "professional_not_found",
                    "message": "No professional exists with the given id",
                    "details": { "professional_id": id }
                }),
            ),
            Self::PremiumRequired => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "premium_required",
                    "message": "Exclusive neighborhoods are available on the premium plan only"
                }),
            ),
            Self::ClaimLimitReached { current, maximum } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "claim_limit_reached",
                    "message": "The professional already holds the maximum number of exclusive neighborhoods",
                    "details": {
                        "current_claims": current,
                        "maximum_claims": maximum
                    }
                }),
            ),
            Self::NeighborhoodTaken { specialty, neighborhood } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "neighborhood_taken",
                    "message": "This neighborhood already has an exclusive professional for the specialty",
                    "details": {
                        "specialty": specialty,
                        "neighborhood": neighborhood
                    }
                }),
            ),
            Self::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "database_error",
                    "message": err.to_string()
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Orders listings for display: higher tiers first, then rating
/// descending, then id, so the ordering is total and re-ranking an
/// already-ranked list changes nothing. Items are moved, never mutated.
pub fn rank_listings(mut listings: Vec<Professional>) -> Vec<Professional> {
    listings.sort_by(|a, b| {
        plan_rank(&b.subscription_plan)
            .cmp(&plan_rank(&a.subscription_plan))
            .then_with(|| b.rating.total_cmp(&a.rating))
            .then_with(|| a.id.cmp(&b.id))
    });
    listings
}

/// Listing and claim access over the `professionals` and
/// `exclusive_claims` tables.
#[derive(Clone)]
pub struct ListingState {
    db: DbHandle,
}

impl ListingState {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub fn create(&self, new: NewProfessional) -> Result<Professional, StoreError> {
        let professional = Professional {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            specialty: new.specialty,
            neighborhood: new.neighborhood,
            city: new.city,
            state: new.state,
            subscription_plan: new.subscription_plan,
            rating: new.rating,
            is_verified: new.is_verified,
        };
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PROFESSIONALS)?;
            table.insert(professional.id.as_str(), encode(&professional)?.as_slice())?;
        }
        txn.commit()?;
        Ok(professional)
    }

    pub fn update(&self, professional: Professional) -> Result<Professional, ListingError> {
        let txn = self.db.begin_write().map_err(StoreError::from)?;
        {
            let mut table = txn.open_table(PROFESSIONALS).map_err(StoreError::from)?;
            if table
                .get(professional.id.as_str())
                .map_err(StoreError::from)?
                .is_none()
            {
                return Err(ListingError::ProfessionalNotFound(professional.id));
            }
            table
                .insert(
                    professional.id.as_str(),
                    encode(&professional)?.as_slice(),
                )
                .map_err(StoreError::from)?;
        }
        txn.commit().map_err(StoreError::from)?;
        Ok(professional)
    }

    pub fn get(&self, id: &str) -> Result<Option<Professional>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROFESSIONALS)?;
        let result = match table.get(id)? {
            Some(raw) => Ok(Some(decode(raw.value())?)),
            None => Ok(None),
        };
        result
    }

    pub fn list(&self) -> Result<Vec<Professional>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROFESSIONALS)?;
        let mut listings = Vec::new();
        for item in table.iter()? {
            let (_key, raw) = item?;
            listings.push(decode(raw.value())?);
        }
        Ok(listings)
    }

    /// Verified listings matching both filters (case- and
    /// diacritic-insensitive substring match; an empty filter matches
    /// everything), ranked for display.
    pub fn search(
        &self,
        specialty: &str,
        neighborhood: &str,
    ) -> Result<Vec<Professional>, StoreError> {
        let specialty = normalize_text(specialty);
        let neighborhood = normalize_text(neighborhood);
        let matches = self
            .list()?
            .into_iter()
            .filter(|p| {
                p.is_verified
                    && normalize_text(&p.specialty).contains(&specialty)
                    && normalize_text(&p.neighborhood).contains(&neighborhood)
            })
            .collect();
        Ok(rank_listings(matches))
    }

    /// Inserts an exclusivity claim, enforcing all three invariants inside
    /// one write transaction: premium plan only, at most `max_claims` per
    /// professional, and a `(specialty, neighborhood)` pair held by at most
    /// one active claim.
    pub fn create_claim(
        &self,
        new: NewClaim,
        max_claims: u32,
    ) -> Result<ExclusiveClaim, ListingError> {
        let txn = self.db.begin_write().map_err(StoreError::from)?;
        let claim = {
            let professionals = txn.open_table(PROFESSIONALS).map_err(StoreError::from)?;
            let professional = match professionals
                .get(new.professional_id.as_str())
                .map_err(StoreError::from)?
            {
                Some(raw) => decode::<Professional>(raw.value())?,
                None => return Err(ListingError::ProfessionalNotFound(new.professional_id)),
            };
            if plan_rank(&professional.subscription_plan) < SubscriptionPlan::Premium.rank() {
                return Err(ListingError::PremiumRequired);
            }

            let mut claims = txn.open_table(EXCLUSIVE_CLAIMS).map_err(StoreError::from)?;
            let mut held = 0u32;
            let specialty_key = normalize_text(&professional.specialty);
            let neighborhood_key = normalize_text(&new.neighborhood);
            for item in claims.iter().map_err(StoreError::from)? {
                let (_key, raw) = item.map_err(StoreError::from)?;
                let existing: ExclusiveClaim = decode(raw.value())?;
                if existing.professional_id == professional.id {
                    held += 1;
                }
                if normalize_text(&existing.specialty) == specialty_key
                    && normalize_text(&existing.neighborhood) == neighborhood_key
                {
                    return Err(ListingError::NeighborhoodTaken {
                        specialty: professional.specialty,
                        neighborhood: new.neighborhood,
                    });
                }
            }
            if held >= max_claims {
                return Err(ListingError::ClaimLimitReached {
                    current: held,
                    maximum: max_claims,
                });
            }

            let claim = ExclusiveClaim {
                id: Uuid::new_v4().to_string(),
                professional_id: professional.id,
                specialty: professional.specialty,
                neighborhood: new.neighborhood,
                city: new.city,
                state: new.state,
                created_at: Utc::now(),
            };
            claims
                .insert(claim.id.as_str(), encode(&claim)?.as_slice())
                .map_err(StoreError::from)?;
            claim
        };
        txn.commit().map_err(StoreError::from)?;
        Ok(claim)
    }

    pub fn claims_for(&self, professional_id: &str) -> Result<Vec<ExclusiveClaim>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EXCLUSIVE_CLAIMS)?;
        let mut claims = Vec::new();
        for item in table.iter()? {
            let (_key, raw) = item?;
            let claim: ExclusiveClaim = decode(raw.value())?;
            if claim.professional_id == professional_id {
                claims.push(claim);
            }
        }
        claims.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(claims)
    }

    /// Removes a claim by id. Returns whether anything was removed;
    /// removing an absent claim is a no-op.
    pub fn delete_claim(&self, id: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let existed = {
            let mut table = txn.open_table(EXCLUSIVE_CLAIMS)?;
            let removed = table.remove(id)?.is_some();
            removed
        };
        txn.commit()?;
        Ok(existed)
    }
}
