#![allow(dead_code)]

use amm_pool_sim::math::bit_field::BitField;
use amm_pool_sim::math::bit_math::most_significant_bit;
use amm_pool_sim::math::fixed_point::{gross_up_ppm, rescale};
use amm_pool_sim::math::math_helpers::{mul_div, mul_div_rounding_up, sqrt};
use amm_pool_sim::pool::maverick_v2::tick_math::tick_sqrt_prices;
use amm_pool_sim::{Pool, PoolSimulator, PoolSnapshot, SwapRequest, U256};
use criterion::{black_box, Criterion};
use std::str::FromStr;

fn u(value: &str) -> U256 {
    U256::from_str(value).unwrap()
}

fn pool(raw: &str) -> Pool {
    let snapshot: PoolSnapshot = serde_json::from_str(raw).unwrap();
    Pool::from_snapshot(&snapshot).unwrap()
}

fn forward(pool: &Pool, amount: &str) -> SwapRequest {
    let tokens = pool.tokens();
    SwapRequest::exact_in(tokens[0].address, tokens[1].address, u(amount))
}

fn forward_out(pool: &Pool, amount: &str) -> SwapRequest {
    let tokens = pool.tokens();
    SwapRequest::exact_out(tokens[0].address, tokens[1].address, u(amount))
}

pub fn bench_math_helpers(c: &mut Criterion) {
    let a = u("389736659726997981000000000000000");
    let b = u("184868330048879109");
    let d = u("1000000000000000000000000000");

    c.bench_function("mul_div", |bench| {
        bench.iter(|| mul_div(black_box(a), black_box(b), black_box(d)))
    });
    c.bench_function("mul_div_rounding_up", |bench| {
        bench.iter(|| mul_div_rounding_up(black_box(a), black_box(b), black_box(d)))
    });
    c.bench_function("sqrt", |bench| bench.iter(|| sqrt(black_box(a * b))));
}

pub fn bench_fixed_point(c: &mut Criterion) {
    let amount = u("1000551594000000000");
    c.bench_function("rescale 18 -> 9", |bench| bench.iter(|| rescale(black_box(amount), 18, 9)));
    c.bench_function("gross_up_ppm", |bench| {
        bench.iter(|| gross_up_ppm(black_box(amount), black_box(U256::from(500u16))))
    });
}

pub fn bench_bit_math(c: &mut Criterion) {
    const SUPPLY: BitField = BitField::new("token1TotalSupplyAdjusted", 196, 60);
    let word = u("100433627766186892308484916703133454632033706992071900119757227880956404");

    c.bench_function("most_significant_bit", |bench| {
        bench.iter(|| most_significant_bit(black_box(word)))
    });
    c.bench_function("bit_field get/set", |bench| {
        bench.iter(|| {
            let supply = SUPPLY.get(black_box(word));
            SUPPLY.set(word, supply + U256::from(1u8))
        })
    });
}

pub fn bench_tick_math(c: &mut Criterion) {
    c.bench_function("tick_sqrt_prices", |bench| {
        bench.iter(|| tick_sqrt_prices(black_box(198), black_box(-414)))
    });
}

pub fn bench_dex_lite(c: &mut Criterion) {
    let pool = pool(include_str!("../../tests/fixtures/dex_lite_pool.json"));
    let exact_in = forward(&pool, "1000000000000000000");
    let exact_out = forward_out(&pool, "1000000000000000000");

    c.bench_function("dex-lite quote exact in", |bench| bench.iter(|| pool.quote(black_box(&exact_in))));
    c.bench_function("dex-lite quote exact out", |bench| bench.iter(|| pool.quote(black_box(&exact_out))));
}

pub fn bench_dex_t1(c: &mut Criterion) {
    let pool = pool(include_str!("../../tests/fixtures/dex_t1_pool.json"));
    let exact_in = forward(&pool, "1000000000000000000000");
    let exact_out = forward_out(&pool, "1000000000000000000000");

    c.bench_function("dex-t1 quote exact in", |bench| bench.iter(|| pool.quote(black_box(&exact_in))));
    c.bench_function("dex-t1 quote exact out", |bench| bench.iter(|| pool.quote(black_box(&exact_out))));
}

pub fn bench_maverick_v2(c: &mut Criterion) {
    let pool = pool(include_str!("../../tests/fixtures/maverick_v2_weth_pool.json"));
    let one_tick = forward(&pool, "1000000000000000");
    let many_ticks = forward(&pool, "100100100100100100");

    c.bench_function("maverick-v2 quote in tick", |bench| bench.iter(|| pool.quote(black_box(&one_tick))));
    c.bench_function("maverick-v2 quote across ticks", |bench| {
        bench.iter(|| pool.quote(black_box(&many_ticks)))
    });
    c.bench_function("maverick-v2 clone and apply", |bench| {
        let result = pool.quote(&many_ticks).unwrap();
        bench.iter(|| {
            let mut branch = pool.clone();
            branch.apply(black_box(&result.delta))
        })
    });
}
