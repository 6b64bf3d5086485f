//! Bin table and the tick → bin index.
//!
//! A tick may hold several bins (one per movement kind). Swaps price the tick
//! on the sum of its bins' reserves and later split the tick's movement back
//! over those bins. When the active tick moves, bins of the matching kind
//! near the time-weighted average are merged and moved to follow it.

use crate::error::MathError;
use crate::hash::{fast_map_with_capacity, FastMap};
use crate::math::math_helpers::{checked_add, mul_div};
use crate::pool::serde_u256;
use alloy_primitives::U256;
use serde::Deserialize;
use tracing::trace;

pub const KIND_STATIC: u8 = 0;
pub const KIND_RIGHT: u8 = 1;
pub const KIND_LEFT: u8 = 2;
pub const KIND_BOTH: u8 = 3;

/// Half a tick in the D8 scale of the time-weighted average.
const MOVE_THRESHOLD_D8: i64 = 50_000_000;
/// Bins gathered by one move.
const MAX_MOVED_BINS: usize = 3;
/// Supply a bin starts from when liquidity is first merged into it.
const MINIMUM_LIQUIDITY: U256 = U256::from_limbs([100_000_000, 0, 0, 0]);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bin {
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub reserve_a: U256,
    #[serde(deserialize_with = "serde_u256::deserialize")]
    pub reserve_b: U256,
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub merge_bin_balance: U256,
    #[serde(default)]
    pub merge_id: u32,
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub total_supply: U256,
    /// 0 static, 1 right, 2 left, 3 both.
    #[serde(default)]
    pub kind: u8,
    pub tick: i32,
    #[serde(default, deserialize_with = "serde_u256::deserialize")]
    pub tick_balance: U256,
}

impl Bin {
    #[inline]
    fn reserve_out(&self, token_a_in: bool) -> U256 {
        if token_a_in {
            self.reserve_b
        } else {
            self.reserve_a
        }
    }
}

/// New reserves of one bin after a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinUpdate {
    pub id: u32,
    pub reserve_a: U256,
    pub reserve_b: U256,
}

/// Reserves and LP supply of a tick, summed over its bins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickState {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub total_supply: U256,
}

fn floor_d8(value: i64) -> i32 {
    (value / 256).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn mul_div_down_or_zero(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div(a, b, denominator)
}

/// Sum of the reserves of every bin at a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReserves {
    pub reserve_a: U256,
    pub reserve_b: U256,
}

impl TickReserves {
    pub fn is_empty(&self) -> bool {
        self.reserve_a.is_zero() && self.reserve_b.is_zero()
    }
}

/// Bins plus the per-tick index over them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinTable {
    pub bins: FastMap<u32, Bin>,
    #[serde(default)]
    pub bin_positions: FastMap<i32, Vec<u32>>,
}

/// LP balance of `parent` that reserves `(delta_a, delta_b)` are worth,
/// measured on the larger side of the parent's tick.
fn lp_balance_from_reserves(
    parent: &Bin,
    tick: &TickState,
    delta_a: U256,
    delta_b: U256,
) -> Result<U256, MathError> {
    let (parent_reserve, delta) = if tick.reserve_a >= tick.reserve_b {
        (parent.reserve_a, delta_a)
    } else {
        (parent.reserve_b, delta_b)
    };
    mul_div_down_or_zero(delta, parent.total_supply.max(U256::ONE), parent_reserve)
}

impl BinTable {
    /// Rebuilds `bin_positions` from each bin's `tick` when the blob left it
    /// out. Ids are kept in ascending order.
    pub fn index(&mut self) {
        if !self.bin_positions.is_empty() {
            return;
        }
        let mut ids: Vec<u32> = self.bins.keys().copied().collect();
        ids.sort_unstable();
        self.bin_positions = fast_map_with_capacity(ids.len());
        for id in ids {
            if let Some(bin) = self.bins.get(&id) {
                self.bin_positions.entry(bin.tick).or_default().push(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bins listed at `tick`, skipping ids missing from the table.
    pub fn bins_at(&self, tick: i32) -> impl Iterator<Item = (u32, &Bin)> + '_ {
        self.bin_positions
            .get(&tick)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.bins.get(id).map(|bin| (*id, bin)))
    }

    /// Consolidated reserves at `tick`, or `None` when no bin sits there.
    pub fn tick_reserves(&self, tick: i32) -> Result<Option<TickReserves>, MathError> {
        let mut found = false;
        let mut total = TickReserves::default();
        for (_, bin) in self.bins_at(tick) {
            found = true;
            total.reserve_a = checked_add(total.reserve_a, bin.reserve_a)?;
            total.reserve_b = checked_add(total.reserve_b, bin.reserve_b)?;
        }
        Ok(found.then_some(total))
    }

    /// Splits a tick's movement over its bins.
    ///
    /// Each bin takes a share of `amount_in` and `amount_out` proportional to
    /// its out-token reserve; the last bin takes what rounding left over. A
    /// drained tick leaves every bin with no out-token reserve.
    pub fn allocate(
        &self,
        tick: i32,
        token_a_in: bool,
        amount_in: U256,
        amount_out: U256,
        drained: bool,
    ) -> Result<Vec<BinUpdate>, MathError> {
        let bins: Vec<(u32, &Bin)> = self.bins_at(tick).collect();
        let total_out = bins
            .iter()
            .try_fold(U256::ZERO, |acc, (_, bin)| checked_add(acc, bin.reserve_out(token_a_in)))?;

        let mut left_in = amount_in;
        let mut left_out = amount_out;
        let mut updates = Vec::with_capacity(bins.len());
        for (position, (id, bin)) in bins.iter().enumerate() {
            let (share_in, share_out) = if position + 1 == bins.len() || total_out.is_zero() {
                (left_in, left_out)
            } else {
                let out = bin.reserve_out(token_a_in);
                (mul_div(amount_in, out, total_out)?, mul_div(amount_out, out, total_out)?)
            };
            left_in = left_in.saturating_sub(share_in);
            left_out = left_out.saturating_sub(share_out);

            let (reserve_in, reserve_out) = if token_a_in {
                (bin.reserve_a, bin.reserve_b)
            } else {
                (bin.reserve_b, bin.reserve_a)
            };
            let reserve_in = checked_add(reserve_in, share_in)?;
            let reserve_out = if drained {
                U256::ZERO
            } else {
                reserve_out.saturating_sub(share_out)
            };
            let (reserve_a, reserve_b) = if token_a_in {
                (reserve_in, reserve_out)
            } else {
                (reserve_out, reserve_in)
            };
            updates.push(BinUpdate { id: *id, reserve_a, reserve_b });

            // with no out-token anywhere the first bin takes everything
            if total_out.is_zero() {
                break;
            }
        }
        Ok(updates)
    }

    /// Reserves of `tick` with the tick balances of its bins as supply.
    pub fn tick_state(&self, tick: i32) -> Result<TickState, MathError> {
        let mut state = TickState::default();
        for (_, bin) in self.bins_at(tick) {
            state.reserve_a = checked_add(state.reserve_a, bin.reserve_a)?;
            state.reserve_b = checked_add(state.reserve_b, bin.reserve_b)?;
            state.total_supply = checked_add(state.total_supply, bin.tick_balance)?;
        }
        Ok(state)
    }

    /// First bin of `kind` listed at `tick`.
    pub fn bin_id_by_kind(&self, tick: i32, kind: u8) -> Option<u32> {
        self.bins_at(tick).find(|(_, bin)| bin.kind == kind).map(|(id, _)| id)
    }

    /// Merges and moves movable bins after the active tick went from
    /// `start_tick` to `end_tick`.
    ///
    /// Moving up gathers right and two-way bins around the average tick
    /// `twa_d8 / 256`, merges them into the lowest id and moves that bin to
    /// the limit tick. Moving down does the same for left and two-way bins.
    /// Static bins never move.
    pub fn move_bins(&mut self, start_tick: i32, end_tick: i32, twa_d8: i64) -> Result<(), MathError> {
        if start_tick == end_tick {
            return Ok(());
        }

        if end_tick > start_tick {
            let twa = floor_d8(twa_d8.saturating_sub(MOVE_THRESHOLD_D8));
            let limit = end_tick.saturating_sub(1).min(twa);
            if twa.saturating_sub(1) < limit {
                for kind in [KIND_RIGHT, KIND_BOTH] {
                    self.move_direction(kind, twa.saturating_sub(1), limit, limit)?;
                }
            }
        } else {
            let twa = floor_d8(twa_d8.saturating_add(MOVE_THRESHOLD_D8));
            let limit = twa.max(end_tick.saturating_add(1));
            if limit < twa.saturating_add(1) {
                for kind in [KIND_LEFT, KIND_BOTH] {
                    self.move_direction(kind, limit, twa.saturating_add(1), limit)?;
                }
            }
        }
        Ok(())
    }

    fn move_direction(&mut self, kind: u8, from: i32, to: i32, limit: i32) -> Result<(), MathError> {
        let mut found: Vec<(i32, u32)> = Vec::with_capacity(MAX_MOVED_BINS);
        let mut tick = from;
        while tick <= to && found.len() < MAX_MOVED_BINS {
            if let Some(id) = self.bin_id_by_kind(tick, kind) {
                found.push((tick, id));
            }
            match tick.checked_add(1) {
                Some(next) => tick = next,
                None => break,
            }
        }

        let Some(&(first_tick, first_id)) = found.iter().min_by_key(|(_, id)| *id) else {
            return Ok(());
        };
        if found.len() == 1 && first_tick == limit {
            return Ok(());
        }

        self.merge_into(first_id, first_tick, &found)?;
        if first_tick != limit {
            self.move_to_tick(first_id, first_tick, limit)?;
        }
        trace!(kind, bin = first_id, from = first_tick, to = limit, merged = found.len() - 1, "maverick-v2 bins moved");
        Ok(())
    }

    /// Folds every other bin of `found` into `parent_id`.
    fn merge_into(&mut self, parent_id: u32, parent_tick: i32, found: &[(i32, u32)]) -> Result<(), MathError> {
        let tick_state = self.tick_state(parent_tick)?;
        let Some(parent) = self.bins.get(&parent_id).cloned() else {
            return Ok(());
        };

        let mut total_a = U256::ZERO;
        let mut total_b = U256::ZERO;
        let mut total_lp = U256::ZERO;
        let mut merged = false;
        for &(tick, id) in found {
            if id == parent_id {
                continue;
            }
            let Some(bin) = self.bins.get_mut(&id) else {
                continue;
            };
            let lp = lp_balance_from_reserves(&parent, &tick_state, bin.reserve_a, bin.reserve_b)?;
            total_a = checked_add(total_a, bin.reserve_a)?;
            total_b = checked_add(total_b, bin.reserve_b)?;
            total_lp = checked_add(total_lp, lp)?;

            bin.reserve_a = U256::ZERO;
            bin.reserve_b = U256::ZERO;
            bin.tick_balance = U256::ZERO;
            bin.merge_id = parent_id;
            bin.merge_bin_balance = lp;
            self.remove_position(tick, id);
            merged = true;
        }
        if !merged {
            return Ok(());
        }

        let Some(parent) = self.bins.get_mut(&parent_id) else {
            return Ok(());
        };
        let delta_tick_balance =
            mul_div_down_or_zero(total_lp, parent.tick_balance.max(U256::ONE), parent.total_supply)?;
        if parent.total_supply.is_zero() {
            parent.total_supply = MINIMUM_LIQUIDITY;
        }
        parent.total_supply = checked_add(parent.total_supply, total_lp)?;
        parent.tick_balance = checked_add(parent.tick_balance, delta_tick_balance)?;
        parent.reserve_a = checked_add(parent.reserve_a, total_a)?;
        parent.reserve_b = checked_add(parent.reserve_b, total_b)?;
        Ok(())
    }

    /// Takes `id` out of `from` and lists it at `to`, priced into the tick
    /// balance of its new tick.
    fn move_to_tick(&mut self, id: u32, from: i32, to: i32) -> Result<(), MathError> {
        let ending = self.tick_state(to)?;
        let Some(bin) = self.bins.get_mut(&id) else {
            return Ok(());
        };
        let (amount, reserve) = if bin.reserve_a > bin.reserve_b {
            (bin.reserve_a, ending.reserve_a)
        } else {
            (bin.reserve_b, ending.reserve_b)
        };
        bin.tick_balance = mul_div(amount, ending.total_supply.max(U256::ONE), reserve.max(U256::ONE))?;
        bin.tick = to;

        self.remove_position(from, id);
        self.bin_positions.entry(to).or_default().push(id);
        Ok(())
    }

    fn remove_position(&mut self, tick: i32, id: u32) {
        if let Some(ids) = self.bin_positions.get_mut(&tick) {
            ids.retain(|listed| *listed != id);
            if ids.is_empty() {
                self.bin_positions.remove(&tick);
            }
        }
    }

    pub fn update(&mut self, update: &BinUpdate) -> bool {
        match self.bins.get_mut(&update.id) {
            Some(bin) => {
                bin.reserve_a = update.reserve_a;
                bin.reserve_b = update.reserve_b;
                true
            }
            None => false,
        }
    }
}
