pub mod enrich;
pub mod links;
pub mod pipeline;
pub mod scraper;
#[cfg(test)]
pub mod testing;
pub mod traits;
