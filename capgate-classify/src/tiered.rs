//! Two-tier classification: cheap first, expensive on low confidence.

use std::sync::Arc;

use async_trait::async_trait;
use capgate_primitives::CapabilityToken;
use tracing::{debug, warn};

use crate::classifier::{ClassifyError, ClassifyResult, IntentClassifier};

/// Composes two strategies behind one [`IntentClassifier`].
///
/// The primary runs first; when its confidence falls below the threshold
/// (or it fails outright), the fallback runs and its token is returned
/// **instead**. The primary's grants are fully discarded on fallback;
/// merging would let a low-confidence cheap decision silently widen the
/// expensive one.
///
/// The threshold is deliberately a constructor parameter: the right value
/// depends on the tiers being composed, so no default is baked in.
pub struct TieredClassifier {
    primary: Arc<dyn IntentClassifier>,
    fallback: Arc<dyn IntentClassifier>,
    threshold: f64,
}

impl TieredClassifier {
    /// Creates a tiered classifier with the supplied confidence threshold.
    ///
    /// The fallback runs whenever the primary's confidence is strictly
    /// below `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::InvalidConfiguration`] when the threshold is
    /// not a finite number in [0, 1].
    pub fn new(
        primary: Arc<dyn IntentClassifier>,
        fallback: Arc<dyn IntentClassifier>,
        threshold: f64,
    ) -> ClassifyResult<Self> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ClassifyError::InvalidConfiguration {
                reason: format!("threshold {threshold} is not a finite number in [0, 1]"),
            });
        }

        Ok(Self {
            primary,
            fallback,
            threshold,
        })
    }

    /// Returns the configured confidence threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[async_trait]
impl IntentClassifier for TieredClassifier {
    async fn classify(&self, user_request: &str) -> ClassifyResult<CapabilityToken> {
        if user_request.trim().is_empty() {
            return Err(ClassifyError::EmptyRequest);
        }

        match self.primary.classify(user_request).await {
            Ok(token) if token.confidence() >= self.threshold => {
                debug!(
                    confidence = token.confidence(),
                    method = token.classification_method(),
                    "primary classification accepted"
                );
                Ok(token)
            }
            Ok(token) => {
                debug!(
                    confidence = token.confidence(),
                    threshold = self.threshold,
                    "primary confidence below threshold, falling back"
                );
                self.fallback.classify(user_request).await
            }
            Err(err) => {
                warn!(error = %err, "primary classifier failed, falling back");
                self.fallback.classify(user_request).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClassifier {
        method: &'static str,
        granted: &'static str,
        confidence: f64,
    }

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(&self, user_request: &str) -> ClassifyResult<CapabilityToken> {
            let token = CapabilityToken::builder(user_request, self.method)
                .grant(self.granted, true)
                .confidence(self.confidence)
                .build()?;
            Ok(token)
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl IntentClassifier for FailingClassifier {
        async fn classify(&self, _user_request: &str) -> ClassifyResult<CapabilityToken> {
            Err(ClassifyError::MalformedResponse {
                reason: "boom".into(),
            })
        }
    }

    fn primary(confidence: f64) -> Arc<dyn IntentClassifier> {
        Arc::new(FixedClassifier {
            method: "primary",
            granted: "cheap_tool",
            confidence,
        })
    }

    fn fallback() -> Arc<dyn IntentClassifier> {
        Arc::new(FixedClassifier {
            method: "fallback",
            granted: "expensive_tool",
            confidence: 0.9,
        })
    }

    #[tokio::test]
    async fn confident_primary_wins() {
        let tiered = TieredClassifier::new(primary(1.0), fallback(), 0.5).unwrap();
        let token = tiered.classify("do the thing").await.unwrap();

        assert_eq!(token.classification_method(), "primary");
        assert!(token.is_granted("cheap_tool"));
    }

    #[tokio::test]
    async fn low_confidence_falls_back_without_merging() {
        let tiered = TieredClassifier::new(primary(0.0), fallback(), 0.5).unwrap();
        let token = tiered.classify("do the thing").await.unwrap();

        assert_eq!(token.classification_method(), "fallback");
        assert!(token.is_granted("expensive_tool"));
        // The primary's grant must not leak into the fallback's token.
        assert!(!token.is_granted("cheap_tool"));
    }

    #[tokio::test]
    async fn primary_error_falls_back() {
        let tiered =
            TieredClassifier::new(Arc::new(FailingClassifier), fallback(), 0.5).unwrap();
        let token = tiered.classify("do the thing").await.unwrap();

        assert_eq!(token.classification_method(), "fallback");
    }

    #[tokio::test]
    async fn both_tiers_failing_surfaces_the_fallback_error() {
        let tiered = TieredClassifier::new(
            Arc::new(FailingClassifier),
            Arc::new(FailingClassifier),
            0.5,
        )
        .unwrap();

        let err = tiered
            .classify("do the thing")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ClassifyError::MalformedResponse { .. }));
    }

    #[test]
    fn threshold_validation() {
        assert!(TieredClassifier::new(primary(1.0), fallback(), 1.5).is_err());
        assert!(TieredClassifier::new(primary(1.0), fallback(), f64::NAN).is_err());
    }

    #[tokio::test]
    async fn empty_request_rejected_before_either_tier() {
        let tiered = TieredClassifier::new(primary(1.0), fallback(), 0.5).unwrap();
        let err = tiered.classify(" ").await.expect_err("should fail");
        assert!(matches!(err, ClassifyError::EmptyRequest));
    }
}
