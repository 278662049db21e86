use crate::error::SagepipeError;
use crate::runtime::Runtime;

use super::output::print_json;

/// GET a Sage resource path and print the JSON body.
pub async fn run_fetch(runtime: &Runtime, resource: &str) -> Result<(), SagepipeError> {
    let body = runtime.sage_client().fetch(resource).await?;
    print_json(&body);
    Ok(())
}
