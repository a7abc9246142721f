use crate::application::VendingService;
use crate::domain::ids::ProductId;
use crate::domain::money::Amount;
use crate::domain::product::Product;
use crate::error::{Result, VendingError};
use serde::Deserialize;
use std::io::Read;
use tracing::warn;

/// One row of a product catalog: `product,name,kind,price,quantity,chariot`.
///
/// `product` and `chariot` may be left empty; a fresh id is drawn for the
/// product and it is stored without a carrier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogRow {
    pub product: Option<ProductId>,
    pub name: String,
    pub kind: String,
    pub price: Amount,
    pub quantity: u32,
    pub chariot: Option<String>,
}

impl CatalogRow {
    pub fn into_product(self) -> Result<(Product, Option<String>)> {
        if self.name.is_empty() {
            return Err(VendingError::ValidationError(
                "Product name is required".to_string(),
            ));
        }
        if self.kind.is_empty() {
            return Err(VendingError::ValidationError(format!(
                "Product {} has no kind",
                self.name
            )));
        }
        let mut product = Product::new(self.name, self.kind, self.price, self.quantity);
        if let Some(id) = self.product {
            product.id = id;
        }
        let chariot = self.chariot.filter(|name| !name.is_empty());
        Ok((product, chariot))
    }
}

/// Reads catalog rows from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record
/// lengths, so a missing trailing `chariot` column is accepted.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows. A malformed row yields an error without
    /// ending the stream.
    pub fn rows(self) -> impl Iterator<Item = Result<CatalogRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(VendingError::from))
    }
}

/// A catalog row that could not be loaded. `line` counts the header as line 1.
#[derive(Debug)]
pub struct RejectedRow {
    pub line: usize,
    pub error: VendingError,
}

#[derive(Debug, Default)]
pub struct CatalogReport {
    pub loaded: usize,
    pub rejected: Vec<RejectedRow>,
}

/// Seeds products (and their carriers) from a catalog. Bad rows are
/// collected in the report; the remaining rows still load.
pub async fn import_catalog<R: Read>(service: &VendingService, source: R) -> CatalogReport {
    let rows: Vec<Result<CatalogRow>> = CatalogReader::new(source).rows().collect();
    let mut report = CatalogReport::default();

    for (index, row) in rows.into_iter().enumerate() {
        let line = index + 2;
        let result = match row.and_then(CatalogRow::into_product) {
            Ok((product, chariot)) => service.seed_product(product, chariot.as_deref()).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(_) => report.loaded += 1,
            Err(error) => {
                warn!(line, %error, "catalog row rejected");
                report.rejected.push(RejectedRow { line, error });
            }
        }
    }
    report
}
