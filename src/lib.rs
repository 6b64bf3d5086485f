//! Deterministic off-chain swap simulators for on-chain AMM designs.
//!
//! This crate exposes:
//! - Integer fixed-point and bit-field primitives (`math::*`) that mirror
//!   Solidity arithmetic exactly.
//! - Three protocol kernels behind one lifecycle contract
//!   ([`pool::PoolSimulator`]): a bit-packed dynamic-state pool
//!   ([`pool::dex_lite`]), a collateral/debt dual-pool router
//!   ([`pool::dex_t1`]) and a tick/bin concentrated-liquidity pool
//!   ([`pool::maverick_v2`]).
//! - A closed [`Pool`] enum for dispatch and a tag → constructor [`Registry`].
//! - Optional `onchain` helpers to cross-check a quote against a live resolver.
//!
//! Every simulator is built once from a [`PoolSnapshot`], quoted with `&self`
//! (quotes never mutate), cloned before speculative branches and advanced
//! with `apply` once a swap is accepted.
//!
//! # Examples
//!
//! ## Quote then apply
//! ```no_run
//! use amm_pool_sim::{Pool, PoolSimulator, PoolSnapshot, SwapRequest, U256};
//!
//! # fn load() -> PoolSnapshot { unimplemented!() }
//! let snapshot: PoolSnapshot = load();
//! let mut pool = Pool::from_snapshot(&snapshot)?;
//!
//! let token_in = pool.tokens()[0].address;
//! let token_out = pool.tokens()[1].address;
//! let request = SwapRequest::exact_in(token_in, token_out, U256::from(1_000_000_000_000_000u64));
//!
//! // Explore on a clone; the canonical instance stays untouched.
//! let mut branch = pool.clone();
//! let result = branch.quote(&request)?;
//! branch.apply(&result.delta)?;
//!
//! // Commit on the canonical instance once the route is accepted.
//! pool.apply(&result.delta)?;
//! # Ok::<(), amm_pool_sim::error::Error>(())
//! ```
//!
//! ## Packed words
//! ```
//! use amm_pool_sim::{math::bit_field::BitField, U256};
//!
//! const FEE: BitField = BitField::new("fee", 0, 13);
//! let word = FEE.set(U256::ZERO, U256::from(100u8)).unwrap();
//! assert_eq!(FEE.get(word), U256::from(100u8));
//! assert!(FEE.set(word, U256::from(1u32 << 13)).is_err());
//! ```

pub use alloy_primitives::{Address, U256};

pub mod config;
pub mod error;
mod hash;
pub mod math;

pub use hash::{fast_map_with_capacity, FastMap};

pub mod pool;

pub use config::SimConfig;
pub use pool::registry::Registry;
pub use pool::{Pool, PoolSimulator, PoolSnapshot, StateDelta, SwapKind, SwapRequest, SwapResult, TokenInfo};

#[cfg(feature = "onchain")]
pub mod onchain;

const U256_E2: U256 = U256::from_limbs([100, 0, 0, 0]);
const U256_E3: U256 = U256::from_limbs([1000, 0, 0, 0]);
const U256_E4: U256 = U256::from_limbs([10000, 0, 0, 0]);
const U256_E6: U256 = U256::from_limbs([1000000, 0, 0, 0]);
const U256_E9: U256 = U256::from_limbs([1000000000, 0, 0, 0]);
const U256_E18: U256 = U256::from_limbs([1000000000000000000, 0, 0, 0]);
const U256_E27: U256 = U256::from_limbs([11515845246265065472, 54210108, 0, 0]);
const U256_E36: U256 = U256::from_limbs([12919594847110692864, 54210108624275221, 0, 0]);
const U256_E38: U256 = U256::from_limbs([687399551400673280, 5421010862427522170, 0, 0]);
const U256_E54: U256 = U256::from_limbs([10538423128046960640, 14202551164014556797, 2938735877055718, 0]);

/// Precision of every price the kernels compare (`1e27`).
pub const PRICE_PRECISION: U256 = U256_E27;
/// Denominator of ppm fees (`1e6`).
pub const FEE_PRECISION: U256 = U256_E6;
