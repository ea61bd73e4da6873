use crate::error::EngineResult;
use crate::models::{BinId, ProductCatalog};

/// Products of one season's schedule grouped by capacity bin.
///
/// Bins appear in the order their first product was seen, and products keep
/// their schedule order within a bin.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinGroups {
    groups: Vec<(BinId, Vec<String>)>,
}

impl BinGroups {
    pub fn iter(&self) -> impl Iterator<Item = (BinId, &[String])> {
        self.groups.iter().map(|(bin, products)| (*bin, products.as_slice()))
    }

    pub fn get(&self, bin: BinId) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(b, _)| *b == bin)
            .map(|(_, products)| products.as_slice())
    }

    pub fn bins(&self) -> Vec<BinId> {
        self.groups.iter().map(|(bin, _)| *bin).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn sort_bins<S: AsRef<str>>(catalog: &ProductCatalog, products: &[S]) -> EngineResult<BinGroups> {
    let mut groups: Vec<(BinId, Vec<String>)> = Vec::new();

    for product in products {
        let product = product.as_ref();
        let bin = catalog.lookup(product)?.bin;
        match groups.iter_mut().find(|(b, _)| *b == bin) {
            Some((_, members)) => members.push(product.to_string()),
            None => groups.push((bin, vec![product.to_string()])),
        }
    }

    Ok(BinGroups { groups })
}
