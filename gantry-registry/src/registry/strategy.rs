use super::instance::ServiceInstance;
use gantry_core::LoadBalanceStrategy;
use rand::Rng;
use std::sync::Arc;

/// 在实例列表上执行一次选择
///
/// 所有策略的第一步都是过滤出健康实例；健康集合为空时返回None，
/// 这是一个已定义的"不可用"结果而不是错误，调用方必须显式处理。
/// 策略本身不跨调用持有状态。
pub fn select(
    strategy: LoadBalanceStrategy,
    instances: &[Arc<ServiceInstance>],
) -> Option<Arc<ServiceInstance>> {
    let healthy: Vec<&Arc<ServiceInstance>> =
        instances.iter().filter(|i| i.is_healthy()).collect();

    if healthy.is_empty() {
        return None;
    }

    let picked = match strategy {
        LoadBalanceStrategy::RoundRobin => select_least_loaded_random(&healthy),
        LoadBalanceStrategy::LeastConnections => select_least_connections(&healthy),
        LoadBalanceStrategy::Random => select_random(&healthy),
        LoadBalanceStrategy::WeightedRoundRobin => select_weighted(&healthy),
    };

    Some(picked.clone())
}

/// round_robin的实际语义：取连接数最小的实例，并列时在并列集合中
/// 随机取一个。连接数快照一次性读取，避免与并发的acquire/release
/// 竞争时得到空的并列集合。
fn select_least_loaded_random<'a>(healthy: &[&'a Arc<ServiceInstance>]) -> &'a Arc<ServiceInstance> {
    let counts: Vec<u32> = healthy.iter().map(|i| i.connection_count()).collect();
    let min = counts.iter().copied().min().unwrap_or(0);
    let tied: Vec<usize> = counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == min)
        .map(|(index, _)| index)
        .collect();

    if tied.len() == 1 {
        return healthy[tied[0]];
    }

    let mut rng = rand::rng();
    healthy[tied[rng.random_range(0..tied.len())]]
}

/// 连接数最小者胜出；并列时取先遇到的实例
fn select_least_connections<'a>(healthy: &[&'a Arc<ServiceInstance>]) -> &'a Arc<ServiceInstance> {
    let mut best = healthy[0];
    let mut best_count = best.connection_count();

    for &instance in healthy.iter().skip(1) {
        let count = instance.connection_count();
        if count < best_count {
            best = instance;
            best_count = count;
        }
    }

    best
}

fn select_random<'a>(healthy: &[&'a Arc<ServiceInstance>]) -> &'a Arc<ServiceInstance> {
    let mut rng = rand::rng();
    healthy[rng.random_range(0..healthy.len())]
}

/// 权重选择：在[0, 总权重)上均匀取样，沿健康列表累加权重，
/// 返回第一个累计权重超过取样值的实例。总权重为0时退化为随机。
fn select_weighted<'a>(healthy: &[&'a Arc<ServiceInstance>]) -> &'a Arc<ServiceInstance> {
    let total: u64 = healthy.iter().map(|i| u64::from(i.weight())).sum();
    if total == 0 {
        return select_random(healthy);
    }

    let mut rng = rand::rng();
    let draw = rng.random_range(0..total);

    let mut cumulative: u64 = 0;
    for &instance in healthy {
        cumulative += u64::from(instance.weight());
        if draw < cumulative {
            return instance;
        }
    }

    // 兜底返回第一个健康实例；有健康实例时绝不返回空结果
    healthy[0]
}
