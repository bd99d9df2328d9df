//! hostname 레이블 카디널리티 제한
//!
//! 세션이 관찰한 서로 다른 hostname 수를 상한으로 묶습니다. 상한에 도달한
//! 뒤 처음 보는 hostname은 [`MAX_HOSTNAMES_REACHED`]로 치환되어 카운트는
//! 유지되지만 새 시계열은 생기지 않습니다.

use std::collections::HashSet;

use tracing::warn;

/// 상한 초과 시 사용하는 hostname 값
pub const MAX_HOSTNAMES_REACHED: &str = "max-hostnames-reached";

/// 기본 hostname 상한
pub const DEFAULT_MAX_HOSTNAMES: usize = 1000;

/// hostname 카디널리티 가드
///
/// 수집 태스크 하나가 소유하며 `&mut self`로만 변경됩니다.
#[derive(Debug)]
pub struct HostnameGuard {
    seen: HashSet<String>,
    max: usize,
    limit_logged: bool,
}

impl HostnameGuard {
    /// 상한을 지정해 가드를 만듭니다.
    pub fn new(max: usize) -> Self {
        Self {
            seen: HashSet::new(),
            max,
            limit_logged: false,
        }
    }

    /// hostname을 허용하거나 센티널로 바꿉니다.
    ///
    /// 이미 본 값은 그대로, 상한 미만이면 기록 후 그대로, 상한에 도달했으면
    /// 기록하지 않고 [`MAX_HOSTNAMES_REACHED`]를 반환합니다.
    pub fn admit(&mut self, hostname: &str) -> String {
        if self.seen.contains(hostname) {
            return hostname.to_owned();
        }
        if self.seen.len() < self.max {
            self.seen.insert(hostname.to_owned());
            return hostname.to_owned();
        }
        if !self.limit_logged {
            // 첫 거부만 경고
            warn!(max = self.max, hostname, "hostname cardinality limit reached");
            self.limit_logged = true;
        }
        MAX_HOSTNAMES_REACHED.to_owned()
    }

    /// 지금까지 허용된 hostname 수
    pub fn admitted(&self) -> usize {
        self.seen.len()
    }
}

impl Default for HostnameGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HOSTNAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_then_sentinel() {
        let mut guard = HostnameGuard::new(3);
        let hosts: Vec<String> = (0..10).map(|i| format!("host{i}.example.com")).collect();
        let admitted: Vec<String> = hosts.iter().map(|h| guard.admit(h)).collect();

        assert_eq!(&admitted[..3], &hosts[..3]);
        assert!(admitted[3..].iter().all(|h| h == MAX_HOSTNAMES_REACHED));
        assert_eq!(guard.admitted(), 3);
    }

    #[test]
    fn known_hostname_still_admitted_after_limit() {
        let mut guard = HostnameGuard::new(2);
        guard.admit("a.com");
        guard.admit("b.com");
        assert_eq!(guard.admit("c.com"), MAX_HOSTNAMES_REACHED);
        assert_eq!(guard.admit("a.com"), "a.com");
        assert_eq!(guard.admit("b.com"), "b.com");
        assert_eq!(guard.admitted(), 2);
    }

    #[test]
    fn empty_hostname_counts_as_an_entry() {
        let mut guard = HostnameGuard::new(1);
        assert_eq!(guard.admit(""), "");
        assert_eq!(guard.admit("a.com"), MAX_HOSTNAMES_REACHED);
        assert_eq!(guard.admit(""), "");
    }

    #[test]
    fn repeated_admission_does_not_grow_state() {
        let mut guard = HostnameGuard::new(5);
        for _ in 0..100 {
            guard.admit("www.foo.com");
        }
        assert_eq!(guard.admitted(), 1);
    }
}
