use tokio::sync::watch;

/// Resolves once the stop flag is set.
///
/// A dropped sender never resolves the future: a stop signal whose owner went away
/// without requesting a stop does not stop anything.
pub async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resolves_on_stop_and_ignores_dropped_sender() {
        let (sender, mut receiver) = watch::channel(false);
        sender.send_replace(true);
        wait_for_stop(&mut receiver).await;

        let (sender, mut receiver) = watch::channel(false);
        drop(sender);
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for_stop(&mut receiver)).await;
        assert!(waited.is_err());
    }
}
