use crate::domain::carrier::{Carrier, CarrierStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct CarrierRow<'a> {
    carrier: &'a str,
    capacity: usize,
    count: usize,
    status: CarrierStatus,
    #[serde(rename = "type")]
    product_type: Option<&'a str>,
}

/// Writes the carrier table as `carrier,capacity,count,status,type`.
pub struct CarrierWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CarrierWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_carriers(&mut self, carriers: &[Carrier]) -> Result<()> {
        for carrier in carriers {
            self.writer.serialize(CarrierRow {
                carrier: &carrier.name,
                capacity: carrier.capacity,
                count: carrier.count(),
                status: carrier.status,
                product_type: carrier.product_type.as_deref(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ProductId;

    #[test]
    fn test_writes_header_and_rows() {
        let mut full = Carrier::new("CHARIOT1", 1).unwrap();
        full.add_product(ProductId::new(), "soda").unwrap();
        let empty = Carrier::new("CHARIOT2", 3).unwrap();

        let mut out = Vec::new();
        CarrierWriter::new(&mut out).write_carriers(&[full, empty]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "carrier,capacity,count,status,type\nCHARIOT1,1,1,Full,soda\nCHARIOT2,3,0,Available,\n"
        );
    }
}
