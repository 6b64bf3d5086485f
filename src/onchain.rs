//! Live cross-check of dual-pool quotes against the on-chain resolver.
//!
//! Nothing here runs on the quote path. A caller that wants a second opinion
//! on a [`SwapResult`] awaits [`LiveChecker::cross_check`]; dropping the
//! future cancels the call, and every call is bounded by
//! [`SimConfig::live_check_timeout`].

use crate::config::SimConfig;
use crate::error::OnchainError;
use crate::math::math_helpers::{abs_diff, mul_div};
use crate::pool::{Pool, PoolSimulator, SwapRequest, SwapResult};
use crate::U256_E4;
use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use alloy_sol_macro::sol;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

sol! {
    #[sol(rpc)]
    interface IDexReservesResolver {
        function estimateSwapIn(
            address dex,
            bool swap0to1,
            uint256 amountIn,
            uint256 amountOutMin
        ) external payable returns (uint256 amountOut);
        function estimateSwapOut(
            address dex,
            bool swap0to1,
            uint256 amountOut,
            uint256 amountInMax
        ) external payable returns (uint256 amountIn);
    }
}

pub type OnchainProvider<P> = Arc<P>;

/// Default deviation, in bps, above which a comparison is logged as diverged.
pub const DEFAULT_MAX_DEVIATION_BPS: u64 = 10;

/// Local estimate next to the resolver's answer, both in token decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveComparison {
    pub estimated: U256,
    pub live: U256,
    /// `|estimated - live| · 1e4 / live`; `U256::MAX` when only `live` is zero.
    pub deviation_bps: U256,
}

impl LiveComparison {
    pub fn new(estimated: U256, live: U256) -> Self {
        let deviation_bps = if live.is_zero() {
            if estimated.is_zero() { U256::ZERO } else { U256::MAX }
        } else {
            mul_div(abs_diff(estimated, live), U256_E4, live).unwrap_or(U256::MAX)
        };
        Self { estimated, live, deviation_bps }
    }

    pub fn is_within(&self, max_bps: u64) -> bool {
        self.deviation_bps <= U256::from(max_bps)
    }
}

#[derive(Debug, Clone)]
pub struct LiveChecker<P> {
    pub resolver: IDexReservesResolver::IDexReservesResolverInstance<OnchainProvider<P>>,
    timeout: Duration,
    max_deviation_bps: u64,
}

impl<P> LiveChecker<P>
where
    P: Provider + Send + Sync + 'static,
{
    pub fn new(resolver: Address, provider: OnchainProvider<P>, config: &SimConfig) -> Self {
        Self {
            resolver: IDexReservesResolver::IDexReservesResolverInstance::new(resolver, provider),
            timeout: config.live_check_timeout,
            max_deviation_bps: DEFAULT_MAX_DEVIATION_BPS,
        }
    }

    pub fn with_max_deviation_bps(mut self, max_bps: u64) -> Self {
        self.max_deviation_bps = max_bps;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Asks the resolver for the same swap `result` was quoted for.
    ///
    /// Only dual-pool kernels have a resolver; other pools are `Unsupported`.
    /// Failures are logged and returned, never retried.
    pub async fn cross_check(
        &self,
        pool: &Pool,
        request: &SwapRequest,
        result: &SwapResult,
    ) -> Result<LiveComparison, OnchainError> {
        let Pool::DexT1(dex) = pool else {
            return Err(OnchainError::Unsupported);
        };
        let dex_address = dex.address();
        let swap0to1 = dex.tokens().first().map(|t| t.address) == Some(request.token_in);

        let live = if request.is_exact_in() {
            let call = self.resolver.estimateSwapIn(dex_address, swap0to1, request.amount, U256::ZERO);
            self.bounded(call.call()).await
        } else {
            let call = self.resolver.estimateSwapOut(dex_address, swap0to1, request.amount, U256::MAX);
            self.bounded(call.call()).await
        };
        let live = match live {
            Ok(live) => live,
            Err(err) => {
                warn!(pool = %dex_address, error = %err, "live cross-check failed");
                return Err(err);
            }
        };

        let comparison = LiveComparison::new(result.amount, live);
        if comparison.is_within(self.max_deviation_bps) {
            debug!(
                pool = %dex_address,
                estimated = %comparison.estimated,
                live = %comparison.live,
                deviation_bps = %comparison.deviation_bps,
                "live cross-check agrees"
            );
        } else {
            warn!(
                pool = %dex_address,
                estimated = %comparison.estimated,
                live = %comparison.live,
                deviation_bps = %comparison.deviation_bps,
                "live cross-check diverged"
            );
        }
        Ok(comparison)
    }

    async fn bounded<F, E>(&self, call: F) -> Result<U256, OnchainError>
    where
        F: IntoFuture<Output = Result<U256, E>>,
        E: std::fmt::Display,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| OnchainError::Timeout(self.timeout))?
            .map_err(|e| OnchainError::Call(e.to_string()))
    }
}

#[cfg(all(test, feature = "onchain"))]
mod tests {
    use super::*;
    use crate::pool::PoolSnapshot;
    use alloy_primitives::{address, Bytes};
    use alloy_provider::transport::mock::Asserter;
    use alloy_provider::ProviderBuilder;

    const RESOLVER: Address = address!("0x05bd8269a20c472b148246de20e6852091bf16ff");

    fn mock_checker() -> (LiveChecker<impl Provider>, Asserter) {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone());
        (LiveChecker::new(RESOLVER, Arc::new(provider), &SimConfig::default()), asserter)
    }

    fn fixture(raw: &str) -> Pool {
        let snapshot: PoolSnapshot = serde_json::from_str(raw).unwrap();
        Pool::from_snapshot(&snapshot).unwrap()
    }

    fn dex_t1() -> Pool {
        fixture(include_str!("../tests/fixtures/dex_t1_pool.json"))
    }

    fn encoded(value: U256) -> Bytes {
        Bytes::from(value.to_be_bytes::<32>().to_vec())
    }

    fn one_token_in(pool: &Pool) -> SwapRequest {
        let tokens = pool.tokens();
        SwapRequest::exact_in(tokens[0].address, tokens[1].address, U256::from(10u64).pow(U256::from(21u8)))
    }

    // --- comparison ---------------------------------------------------------------

    #[test]
    fn deviation_in_bps() {
        let comparison = LiveComparison::new(U256::from(10_010u32), U256::from(10_000u32));
        assert_eq!(comparison.deviation_bps, U256::from(10u8));
        assert!(comparison.is_within(10));
        assert!(!comparison.is_within(9));

        assert_eq!(LiveComparison::new(U256::ZERO, U256::ZERO).deviation_bps, U256::ZERO);
        assert_eq!(LiveComparison::new(U256::ONE, U256::ZERO).deviation_bps, U256::MAX);
    }

    #[test]
    fn checker_takes_timeout_from_config() {
        let (checker, _) = mock_checker();
        assert_eq!(checker.timeout(), Duration::from_secs(5));
        assert_eq!(*checker.resolver.address(), RESOLVER);
        assert_eq!(checker.max_deviation_bps, DEFAULT_MAX_DEVIATION_BPS);
        assert_eq!(checker.with_max_deviation_bps(50).max_deviation_bps, 50);
    }

    // --- resolver calls -----------------------------------------------------------

    #[tokio::test]
    async fn matching_resolver_answer() {
        let (checker, asserter) = mock_checker();
        let pool = dex_t1();
        let request = one_token_in(&pool);
        let result = pool.quote(&request).unwrap();

        asserter.push_success(&encoded(result.amount));
        let comparison = checker.cross_check(&pool, &request, &result).await.unwrap();
        assert_eq!(comparison.live, result.amount);
        assert_eq!(comparison.deviation_bps, U256::ZERO);
    }

    #[tokio::test]
    async fn diverging_answer_is_still_returned() {
        let (checker, asserter) = mock_checker();
        let pool = dex_t1();
        let request = one_token_in(&pool);
        let result = pool.quote(&request).unwrap();

        asserter.push_success(&encoded(result.amount / U256::from(2u8)));
        let comparison = checker.cross_check(&pool, &request, &result).await.unwrap();
        assert!(!comparison.is_within(DEFAULT_MAX_DEVIATION_BPS));
        assert_eq!(comparison.estimated, result.amount);
    }

    #[tokio::test]
    async fn reverted_call_is_reported() {
        let (checker, asserter) = mock_checker();
        let pool = dex_t1();
        let request = one_token_in(&pool);
        let result = pool.quote(&request).unwrap();

        asserter.push_failure_msg("execution reverted");
        let err = checker.cross_check(&pool, &request, &result).await.unwrap_err();
        assert!(matches!(err, OnchainError::Call(_)));
    }

    #[tokio::test]
    async fn other_kernels_are_unsupported() {
        let (checker, _) = mock_checker();
        let pool = fixture(include_str!("../tests/fixtures/dex_lite_pool.json"));
        let request = one_token_in(&pool);
        let result = pool.quote(&request).unwrap();

        let err = checker.cross_check(&pool, &request, &result).await.unwrap_err();
        assert!(matches!(err, OnchainError::Unsupported));
    }
}
