//! Beat catalog listing

use crate::application::ports::{BeatCatalog, CatalogError};

use super::presenter::Presenter;

/// Print every beat the catalog offers
pub async fn handle_beats_command<C: BeatCatalog>(
    catalog: &C,
    presenter: &Presenter,
) -> Result<(), CatalogError> {
    let beats = catalog.list_beats().await?;
    if beats.is_empty() {
        presenter.info("The catalog has no beats yet");
        return Ok(());
    }
    for beat in &beats {
        presenter.beat_row(beat);
    }
    Ok(())
}
