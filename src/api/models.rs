use crate::api::{ModelInfo, ModelsResponse};
use crate::core::error::ChatError;
use crate::core::stream::format_api_error;
use crate::utils::url::construct_api_url;

/// List the models installed on the server (`GET /api/tags`).
pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<ModelInfo>, ChatError> {
    let models_url = construct_api_url(base_url, "api/tags");
    let response = client.get(models_url).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(ChatError::Network(format!(
            "HTTP {status}: {}",
            format_api_error(&error_text)
        )));
    }

    let models_response = response.json::<ModelsResponse>().await?;
    Ok(models_response.into_models())
}

pub fn sort_models(models: &mut [ModelInfo]) {
    // Most recently modified first, then by id for a stable listing.
    models.sort_by(|a, b| match (&a.modified_at, &b.modified_at) {
        (Some(a_modified), Some(b_modified)) => b_modified
            .cmp(a_modified)
            .then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}
