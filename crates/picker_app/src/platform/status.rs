//! One-line summaries of engine responses.

use picker_engine::{DownloadResult, Response};

pub fn status_line(response: &Response) -> String {
    match response {
        Response::Zip(zip) => format!(
            "Saved {} file(s) in {}{}",
            zip.count,
            zip.filename,
            problems(&zip.results)
        ),
        Response::Individual(individual) => format!(
            "Downloaded {} file(s){}",
            individual.count,
            problems(&individual.results)
        ),
        Response::Single(single) => format!("Downloaded {}", single.filename),
        Response::Blobs(blobs) => format!(
            "Retrieved {} item(s), {} failed",
            blobs.blobs.len(),
            blobs.errors.len()
        ),
        Response::DownloadStatus(status) => format!(
            "{} active, {} completed, {} failed",
            status.active, status.completed, status.failed
        ),
        Response::State(state) => format!(
            "{} detected, {} selected",
            state.detected_count, state.selected_count
        ),
        Response::Failure(failure) => format!("Error: {}", failure.error),
        Response::Ack(ack) if ack.success => "OK".to_string(),
        Response::Ack(_) => "Rejected".to_string(),
        Response::Pong(_) => "Page is responding".to_string(),
        Response::Detected(list) => format!("{} detected", list.detected.len()),
        Response::DownloadUrls(list) => format!("{} selected", list.urls.len()),
    }
}

fn problems(result: &DownloadResult) -> String {
    match (result.failed.len(), result.skipped.len()) {
        (0, 0) => String::new(),
        (failed, 0) => format!(" ({failed} failed)"),
        (0, skipped) => format!(" ({skipped} skipped)"),
        (failed, skipped) => format!(" ({failed} failed, {skipped} skipped)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picker_engine::{IndividualResponse, MediaError, FailedItem};

    #[test]
    fn failures_are_prefixed() {
        assert_eq!(
            status_line(&Response::messaging_failure()),
            "Error: cannot communicate with the page; try refreshing it"
        );
    }

    #[test]
    fn partial_batches_mention_problems() {
        let mut results = DownloadResult::default();
        let invalid = MediaError::InvalidUrl {
            url: "x".to_string(),
            reason: "no media signal".to_string(),
        };
        results.skipped.push(FailedItem::new("x".to_string(), &invalid));
        let response = Response::Individual(IndividualResponse {
            success: true,
            count: 2,
            failed: 1,
            results,
        });
        assert_eq!(status_line(&response), "Downloaded 2 file(s) (1 skipped)");
    }
}
