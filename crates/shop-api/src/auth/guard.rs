//! 基于角色的访问控制
//!
//! 常用的角色组合以具名常量提供，路由声明时直接复用。

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};

use super::principal::{Principal, Role};
use crate::error::AuthError;
use crate::middleware::{auth_middleware, require_roles};
use crate::state::AppState;

/// 主体缺失或角色不在允许集合中时拒绝
pub fn authorize(principal: Option<&Principal>, allowed: &[Role]) -> Result<(), AuthError> {
    match principal {
        Some(p) if allowed.contains(&p.role) => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}

/// 固定角色集合的守卫
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGuard {
    name: &'static str,
    roles: &'static [Role],
}

impl RoleGuard {
    pub const ADMIN_ONLY: RoleGuard = RoleGuard::new("admin", &[Role::Admin]);
    pub const SELLER_ONLY: RoleGuard = RoleGuard::new("seller", &[Role::Seller]);
    pub const CUSTOMER_ONLY: RoleGuard = RoleGuard::new("customer", &[Role::Customer]);
    pub const SELLER_OR_ADMIN: RoleGuard =
        RoleGuard::new("seller-or-admin", &[Role::Seller, Role::Admin]);
    pub const CUSTOMER_OR_ADMIN: RoleGuard =
        RoleGuard::new("customer-or-admin", &[Role::Customer, Role::Admin]);
    pub const SELLER_OR_CUSTOMER: RoleGuard =
        RoleGuard::new("seller-or-customer", &[Role::Seller, Role::Customer]);
    pub const ANY_AUTHENTICATED: RoleGuard = RoleGuard::new(
        "all-roles",
        &[Role::Admin, Role::Seller, Role::Customer, Role::User],
    );

    /// 全部具名守卫
    pub const ALL: [RoleGuard; 7] = [
        Self::ADMIN_ONLY,
        Self::SELLER_ONLY,
        Self::CUSTOMER_ONLY,
        Self::SELLER_OR_ADMIN,
        Self::CUSTOMER_OR_ADMIN,
        Self::SELLER_OR_CUSTOMER,
        Self::ANY_AUTHENTICATED,
    ];

    pub const fn new(name: &'static str, roles: &'static [Role]) -> Self {
        Self { name, roles }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn roles(&self) -> &'static [Role] {
        self.roles
    }

    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn check(&self, principal: Option<&Principal>) -> Result<(), AuthError> {
        authorize(principal, self.roles)
    }

    /// 为路由挂上认证 + 角色校验
    ///
    /// `route_layer` 后加的先执行：先认证，再校验角色。
    pub fn protect(self, router: Router<AppState>, state: AppState) -> Router<AppState> {
        router
            .route_layer(from_fn(require_roles(self)))
            .route_layer(from_fn_with_state(state, auth_middleware))
    }
}
