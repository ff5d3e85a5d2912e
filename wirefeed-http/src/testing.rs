use async_trait::async_trait;
use std::sync::Mutex;
use wirefeed::proto::PaymentPayload;
use wirefeed::{Error, Invoice, InvoicePayer, Network, PaymentHeader};

/// Payer that records invoices and returns a fixed header.
#[derive(Debug, Default)]
pub struct FixedPayer {
    paid: Mutex<Vec<(u64, String)>>,
}

impl FixedPayer {
    pub fn paid(&self) -> Vec<(u64, String)> {
        self.paid.lock().unwrap().clone()
    }
}

#[async_trait]
impl InvoicePayer for FixedPayer {
    fn payer_address(&self) -> String {
        "Payer1".to_owned()
    }

    fn network(&self) -> Network {
        Network::Sol
    }

    async fn pay(&self, invoice: &Invoice, fee_payer: &str) -> Result<PaymentHeader, Error> {
        self.paid.lock().unwrap().push((invoice.amount(), fee_payer.to_owned()));
        PaymentHeader::encode(&PaymentPayload::solana("AQID".to_owned()))
    }
}
