use anyhow::{Context, Result};

use platter_core::models::NewFood;
use platter_core::openfoodfacts::ProductResponse;
use platter_core::service::FoodLookupProvider;

const PRODUCT_URL: &str = "https://world.openfoodfacts.org/api/v2/product";
const PRODUCT_FIELDS: &str = "product_name,generic_name,brands,code,nutriments";

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    rt: tokio::runtime::Handle,
}

impl OpenFoodFactsClient {
    /// Must be called from inside a tokio runtime.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "platter/{} (meal planner)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            rt: tokio::runtime::Handle::current(),
        })
    }

    pub async fn lookup_barcode_async(&self, barcode: &str) -> Result<Option<NewFood>> {
        let url = format!("{PRODUCT_URL}/{barcode}.json");
        let resp = self
            .client
            .get(&url)
            .query(&[("fields", PRODUCT_FIELDS)])
            .send()
            .await
            .context("Failed to reach OpenFoodFacts API")?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let data: ProductResponse = resp
            .error_for_status()
            .context("OpenFoodFacts API error")?
            .json()
            .await
            .context("Failed to parse OpenFoodFacts product response")?;

        Ok(data.into_food(barcode))
    }
}

impl FoodLookupProvider for OpenFoodFactsClient {
    fn lookup_barcode(&self, barcode: &str) -> Result<Option<NewFood>> {
        self.rt.block_on(self.lookup_barcode_async(barcode))
    }
}
