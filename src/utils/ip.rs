//! IP 地址处理工具
//!
//! 提供：
//! - 客户端 IP 提取（可信代理 + 私有地址自动检测）
//! - CIDR / 字符串前缀匹配
//! - 不可路由地址判断（这类地址不送去做地理位置查询）

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7 (ULA)
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10 (link-local)
        }
    }
}

/// 检查 IP 是否不可在公网路由
///
/// 在 `is_private_or_local` 基础上额外覆盖链路本地、CGNAT、文档保留段、组播等
pub fn is_non_routable(ip: &IpAddr) -> bool {
    if is_private_or_local(ip) {
        return true;
    }
    match ip {
        IpAddr::V4(v4) => is_non_routable_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_local(&IpAddr::V4(mapped)) || is_non_routable_v4(&mapped);
            }
            is_non_routable_v6(v6)
        }
    }
}

fn is_non_routable_v4(v4: &Ipv4Addr) -> bool {
    let octets = v4.octets();
    v4.is_unspecified()
        || v4.is_link_local()
        || v4.is_broadcast()
        || v4.is_documentation()
        || v4.is_multicast()
        || octets[0] == 0
        // 100.64.0.0/10 (CGNAT)
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // 240.0.0.0/4 (保留)
        || octets[0] >= 240
}

fn is_non_routable_v6(v6: &Ipv6Addr) -> bool {
    let first = v6.segments()[0];
    v6.is_unspecified()
        || v6.is_multicast()
        // 2001:db8::/32 (文档保留)
        || (first == 0x2001 && v6.segments()[1] == 0x0db8)
}

/// 解析用户输入的 IP
///
/// 允许首尾空白、`ip:port`、`[v6]:port` 形式
pub fn parse_ip_input(input: &str) -> Option<IpAddr> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<IpAddr>()
        .ok()
        .or_else(|| trimmed.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// 检查 IP 是否在可信代理列表中
pub fn is_trusted_proxy(ip: &str, trusted_proxies: &[String]) -> bool {
    let Some(ip_addr) = parse_ip_input(ip) else {
        return false;
    };

    trusted_proxies.iter().any(|proxy| {
        if proxy.contains('/') {
            ip_in_cidr(&ip_addr, proxy)
        } else {
            proxy.parse::<IpAddr>().is_ok_and(|p| p == ip_addr)
        }
    })
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };

    let Ok(prefix_len): Result<u8, _> = prefix_len.trim().parse() else {
        return false;
    };

    let Ok(network_addr) = network.trim().parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u32::from_be_bytes(ip.octets());
            let net_bits = u32::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u128::from_be_bytes(ip.octets());
            let net_bits = u128::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        _ => false, // IPv4 vs IPv6 不匹配
    }
}

/// 前缀规则匹配
///
/// 规则含 `/` 按 CIDR 处理，否则按规范化后的文本前缀比较
pub fn matches_ip_rule(ip: &IpAddr, rule: &str) -> bool {
    let rule = rule.trim();
    if rule.is_empty() {
        return false;
    }
    if rule.contains('/') {
        return ip_in_cidr(ip, rule);
    }
    ip.to_string().starts_with(&rule.to_ascii_lowercase())
}

/// 从请求提取真实客户端 IP
///
/// 策略（按优先级）：
/// 1. 显式配置 trusted_proxies 且连接来自其中 → 使用 X-Forwarded-For
/// 2. 显式配置但不匹配 → 使用连接 IP（防止伪造）
/// 3. 未配置且连接来自私有 IP → 视为反向代理，使用 X-Forwarded-For
/// 4. 默认 → 使用连接 IP
pub fn extract_client_ip(req: &HttpRequest, trusted_proxies: &[String]) -> Option<String> {
    let peer_ip = req.peer_addr().map(|addr| addr.ip().to_string());
    resolve_client_ip(peer_ip.as_deref(), req.headers(), trusted_proxies)
}

/// `extract_client_ip` 的核心逻辑，与 HttpRequest 解耦便于测试
pub fn resolve_client_ip(
    peer_ip: Option<&str>,
    headers: &HeaderMap,
    trusted_proxies: &[String],
) -> Option<String> {
    let Some(peer_ip) = peer_ip else {
        return extract_forwarded_ip_from_headers(headers);
    };

    if !trusted_proxies.is_empty() {
        if is_trusted_proxy(peer_ip, trusted_proxies) {
            let real_ip =
                extract_forwarded_ip_from_headers(headers).unwrap_or_else(|| peer_ip.to_string());
            debug!("Trusted proxy (explicit): {} -> {}", peer_ip, real_ip);
            return Some(real_ip);
        }
        return Some(peer_ip.to_string());
    }

    if let Some(ip_addr) = parse_ip_input(peer_ip)
        && is_private_or_local(&ip_addr)
        && let Some(real_ip) = extract_forwarded_ip_from_headers(headers)
    {
        debug!(
            "Auto-detect proxy (private IP {}): using X-Forwarded-For: {}",
            peer_ip, real_ip
        );
        return Some(real_ip);
    }

    Some(peer_ip.to_string())
}

/// 从 HeaderMap 提取转发的 IP（X-Forwarded-For 或 X-Real-IP）
pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}
