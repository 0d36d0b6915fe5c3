//! Record aggregation across documents.
//!
//! Documents are parsed in the order the normalizer produced them and each
//! document's rows are appended in the order the parser returned them. The
//! concurrent variant parses on blocking workers but reassembles results in
//! the same order, so both variants yield identical datasets.
//!
//! Parse and schema errors name the document by its archive, not by its
//! location in the scratch area.

use crate::archive::DecodedDocument;
use crate::error::{IngestError, ParseFault};
use crate::models::{AuthResult, FailurePolicy, IngestOutcome};
use futures::stream::{self, StreamExt};
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Parse every document sequentially and collect the rows.
pub fn aggregate<F>(
    documents: &[DecodedDocument],
    mut parse: F,
    policy: FailurePolicy,
) -> Result<IngestOutcome, IngestError>
where
    F: FnMut(&Path) -> Result<Vec<AuthResult>, IngestError>,
{
    let mut outcome = IngestOutcome {
        documents: documents.len(),
        ..IngestOutcome::default()
    };

    for doc in documents {
        let result = parse(&doc.path).map_err(|e| e.attributed_to(doc.source()));
        if let Some(rows) = policy.isolate(result, &mut outcome.failures)? {
            outcome.dataset.extend(rows);
        }
    }

    Ok(outcome)
}

/// Parse up to `concurrency` documents at a time on blocking workers.
///
/// Every spawned parse finishes before this returns, even when one of them
/// fails, so callers may tear down the documents' storage afterwards.
pub async fn aggregate_concurrent<F>(
    documents: &[DecodedDocument],
    parse: F,
    policy: FailurePolicy,
    concurrency: usize,
) -> Result<IngestOutcome, IngestError>
where
    F: Fn(&Path) -> Result<Vec<AuthResult>, IngestError> + Send + Sync + 'static,
{
    let parse = Arc::new(parse);

    let joined: Vec<_> = stream::iter(documents.iter().cloned())
        .map(|doc| {
            let parse = Arc::clone(&parse);
            tokio::task::spawn_blocking(move || parse(&doc.path))
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = IngestOutcome {
        documents: documents.len(),
        ..IngestOutcome::default()
    };

    for (doc, result) in documents.iter().zip(joined) {
        let result = match result {
            Ok(parsed) => parsed,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(IngestError::Parse {
                path: doc.path.clone(),
                source: ParseFault::Io(io::Error::new(io::ErrorKind::Interrupted, e)),
            }),
        }
        .map_err(|e| e.attributed_to(doc.source()));
        if let Some(rows) = policy.isolate(result, &mut outcome.failures)? {
            outcome.dataset.extend(rows);
        }
    }

    Ok(outcome)
}
