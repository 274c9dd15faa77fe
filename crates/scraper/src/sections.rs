use blockharvest_browser::PageDriver;
use blockharvest_core::Result;
use tracing::info;

/// Every component section on the listing page, in document order.
///
/// Inner structure is not checked here; the extractor skips malformed sections.
pub async fn enumerate_sections<D: PageDriver>(page: &D, selector: &str) -> Result<Vec<D::Node>> {
    info!(selector, "Finding component sections");
    let sections = page.query_all(selector).await?;
    info!(count = sections.len(), "Found component sections to process");
    Ok(sections)
}
