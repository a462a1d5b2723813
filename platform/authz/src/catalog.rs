//! Static permission catalog: the closed resource vocabulary, detailed
//! capabilities and the system role bundles seeded at deploy time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::AuthzError;

pub const ACTION_VIEW: &str = "view";
pub const ACTION_CREATE: &str = "create";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_DELETE: &str = "delete";
pub const ACTION_MANAGE: &str = "manage";

pub const SCOPE_ALL: &str = "all";

/// Actions seeded for every catalog key.
pub const SEEDED_ACTIONS: [&str; 5] = [
    ACTION_VIEW,
    ACTION_CREATE,
    ACTION_UPDATE,
    ACTION_DELETE,
    ACTION_MANAGE,
];

/// Capability areas that pages and API routes are gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Dashboard,
    CustomerService,
    OrderManagement,
    ReviewManagement,
    AsManagement,
    InventoryManagement,
    PartnerManagement,
    PerformanceAnalytics,
    ShoppingMall,
    MasterData,
    SystemManagement,
    Marketing,
    Performance,
    Alerts,
    Reports,
}

impl Resource {
    pub const ALL: [Resource; 15] = [
        Resource::Dashboard,
        Resource::CustomerService,
        Resource::OrderManagement,
        Resource::ReviewManagement,
        Resource::AsManagement,
        Resource::InventoryManagement,
        Resource::PartnerManagement,
        Resource::PerformanceAnalytics,
        Resource::ShoppingMall,
        Resource::MasterData,
        Resource::SystemManagement,
        Resource::Marketing,
        Resource::Performance,
        Resource::Alerts,
        Resource::Reports,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Dashboard => "dashboard",
            Resource::CustomerService => "customer_service",
            Resource::OrderManagement => "order_management",
            Resource::ReviewManagement => "review_management",
            Resource::AsManagement => "as_management",
            Resource::InventoryManagement => "inventory_management",
            Resource::PartnerManagement => "partner_management",
            Resource::PerformanceAnalytics => "performance_analytics",
            Resource::ShoppingMall => "shopping_mall",
            Resource::MasterData => "master_data",
            Resource::SystemManagement => "system_management",
            Resource::Marketing => "marketing",
            Resource::Performance => "performance",
            Resource::Alerts => "alerts",
            Resource::Reports => "reports",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Resource::Dashboard => "Dashboard",
            Resource::CustomerService => "Customer service",
            Resource::OrderManagement => "Order management",
            Resource::ReviewManagement => "Review management",
            Resource::AsManagement => "After-service management",
            Resource::InventoryManagement => "Inventory management",
            Resource::PartnerManagement => "Partner management",
            Resource::PerformanceAnalytics => "Performance analytics",
            Resource::ShoppingMall => "Shopping mall management",
            Resource::MasterData => "Product master data",
            Resource::SystemManagement => "System management",
            Resource::Marketing => "Marketing automation",
            Resource::Performance => "Performance management",
            Resource::Alerts => "Alerts and monitoring",
            Resource::Reports => "Report generation",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Resource::Dashboard => "Overview and headline metrics",
            Resource::CustomerService => "Chat, consultations and voice of the customer",
            Resource::OrderManagement => "Orders, leads and sales pipeline",
            Resource::ReviewManagement => "Review collection and support inbox",
            Resource::AsManagement => "After-service requests and their KPIs",
            Resource::InventoryManagement => "Stock levels, receiving and shipping",
            Resource::PartnerManagement => "Partner companies and their trades",
            Resource::PerformanceAnalytics => "Revenue, KPI and trend analysis",
            Resource::ShoppingMall => "Products, categories and promotions",
            Resource::MasterData => "Product and code master data",
            Resource::SystemManagement => "Users, roles and system settings",
            Resource::Marketing => "Automated campaigns and coupons",
            Resource::Performance => "Operational performance indicators",
            Resource::Alerts => "Threshold alerts on orders and customers",
            Resource::Reports => "Generated business reports",
        }
    }

    /// Heading the role editor lists this area (and its capabilities) under.
    pub fn group(self) -> &'static str {
        match self {
            Resource::Dashboard => "Main",
            Resource::InventoryManagement
            | Resource::PartnerManagement
            | Resource::ShoppingMall
            | Resource::MasterData => "Operations",
            Resource::PerformanceAnalytics => "Analytics",
            Resource::SystemManagement => "System",
            other => other.display_name(),
        }
    }

    /// Resolves a granted resource key to the category it unlocks.
    ///
    /// Category keys map to themselves. Detailed keys (`category:capability`)
    /// map to their category only when the capability is in the catalog, so a
    /// misspelled grant unlocks nothing.
    pub fn from_grant(key: &str) -> Option<Resource> {
        if key.contains(':') {
            DETAILED_CAPABILITIES
                .iter()
                .find(|capability| capability.key == key)
                .map(|capability| capability.category)
        } else {
            key.parse().ok()
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .iter()
            .copied()
            .find(|resource| resource.as_str() == value)
            .ok_or_else(|| AuthzError::UnknownResource(value.to_string()))
    }
}

/// A fine-grained capability under one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub key: &'static str,
    pub category: Resource,
    pub display_name: &'static str,
    pub description: &'static str,
}

const fn capability(
    key: &'static str,
    category: Resource,
    display_name: &'static str,
    description: &'static str,
) -> Capability {
    Capability {
        key,
        category,
        display_name,
        description,
    }
}

pub const DETAILED_CAPABILITIES: &[Capability] = &[
    capability(
        "customer_service:ai_chatbot",
        Resource::CustomerService,
        "AI chatbot replies",
        "Chatbot setup and automatic replies",
    ),
    capability(
        "customer_service:consultation_history",
        Resource::CustomerService,
        "Consultation history",
        "Browse and manage past consultations",
    ),
    capability(
        "customer_service:agent_connection",
        Resource::CustomerService,
        "Agent hand-off",
        "Assign and connect customers to agents",
    ),
    capability(
        "customer_service:priority_classification",
        Resource::CustomerService,
        "Inquiry triage",
        "Classify inquiries by urgency",
    ),
    capability(
        "order_management:data_integration",
        Resource::OrderManagement,
        "Order data integration",
        "Customer detail lookup across order sources",
    ),
    capability(
        "order_management:status_check",
        Resource::OrderManagement,
        "Order status",
        "Track order processing status",
    ),
    capability(
        "order_management:delivery_info",
        Resource::OrderManagement,
        "Delivery tracking",
        "Shipment tracking and delivery updates",
    ),
    capability(
        "order_management:error_validation",
        Resource::OrderManagement,
        "Order validation",
        "Detect and correct order data errors",
    ),
    capability(
        "review_management:auto_collection",
        Resource::ReviewManagement,
        "Review collection",
        "Collect reviews from connected malls",
    ),
    capability(
        "review_management:llm_classification",
        Resource::ReviewManagement,
        "Review classification",
        "Model-based sentiment and topic tagging",
    ),
    capability(
        "review_management:complaint_alert",
        Resource::ReviewManagement,
        "Complaint alerts",
        "Notify on negative reviews",
    ),
    capability(
        "review_management:summary_report",
        Resource::ReviewManagement,
        "Review summary",
        "Review statistics and summaries",
    ),
    capability(
        "as_management:request_management",
        Resource::AsManagement,
        "After-service requests",
        "Intake and handling of after-service requests",
    ),
    capability(
        "as_management:kpi_dashboard",
        Resource::AsManagement,
        "After-service KPIs",
        "Resolution time and volume indicators",
    ),
    capability(
        "as_management:llm_insights",
        Resource::AsManagement,
        "After-service insights",
        "Model-generated analysis of after-service cases",
    ),
    capability(
        "marketing:coupon",
        Resource::Marketing,
        "Targeted coupons",
        "Generate and send customer-specific coupons",
    ),
    capability(
        "marketing:repurchase",
        Resource::Marketing,
        "Repurchase reminders",
        "Reminders based on purchase cycles",
    ),
    capability(
        "marketing:event",
        Resource::Marketing,
        "Event announcements",
        "Announce events to targeted customers",
    ),
    capability(
        "marketing:winback",
        Resource::Marketing,
        "Win-back campaigns",
        "Re-engage churned customers",
    ),
    capability(
        "marketing:analytics",
        Resource::Marketing,
        "Campaign analytics",
        "Campaign results and ROI",
    ),
    capability(
        "performance:kpi",
        Resource::Performance,
        "Live KPIs",
        "Real-time key indicators",
    ),
    capability(
        "performance:customers",
        Resource::Performance,
        "Customer analysis",
        "Customer behaviour and purchase patterns",
    ),
    capability(
        "performance:inquiry",
        Resource::Performance,
        "Inquiry analysis",
        "Inquiry trends and response performance",
    ),
    capability(
        "performance:channel",
        Resource::Performance,
        "Channel comparison",
        "Sales performance per channel",
    ),
    capability(
        "alerts:orders",
        Resource::Alerts,
        "Order surge alerts",
        "Notify on sudden order spikes",
    ),
    capability(
        "alerts:churn",
        Resource::Alerts,
        "Churn risk alerts",
        "Notify on customers at risk of churning",
    ),
    capability(
        "reports:insights",
        Resource::Reports,
        "Insight reports",
        "Generated business insight reports",
    ),
];

/// Labels for one grantable key, as shown by the role editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub group: &'static str,
    /// False for category keys, true for `category:capability` keys.
    pub detailed: bool,
}

pub fn catalog_entry(key: &str) -> Option<CatalogEntry> {
    if let Some(capability) = DETAILED_CAPABILITIES.iter().find(|c| c.key == key) {
        return Some(CatalogEntry {
            key: capability.key,
            display_name: capability.display_name,
            description: capability.description,
            group: capability.category.group(),
            detailed: true,
        });
    }
    let resource = key.parse::<Resource>().ok()?;
    Some(CatalogEntry {
        key: resource.as_str(),
        display_name: resource.display_name(),
        description: resource.description(),
        group: resource.group(),
        detailed: false,
    })
}

fn detailed_keys_of(category: Resource) -> impl Iterator<Item = &'static str> {
    DETAILED_CAPABILITIES
        .iter()
        .filter(move |capability| capability.category == category)
        .map(|capability| capability.key)
}

/// Every grantable resource key: categories first, then detailed capabilities.
pub fn catalog_keys() -> Vec<&'static str> {
    Resource::ALL
        .iter()
        .map(|resource| resource.as_str())
        .chain(DETAILED_CAPABILITIES.iter().map(|capability| capability.key))
        .collect()
}

/// A capability triple as stored and as carried in an effective set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub action: String,
    pub scope: String,
}

impl Permission {
    pub fn new(
        resource: impl Into<String>,
        action: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            scope: scope.into(),
        }
    }

    /// The category this grant unlocks, if the resource key is in the catalog.
    pub fn category(&self) -> Option<Resource> {
        Resource::from_grant(&self.resource)
    }
}

/// A role shipped with the system; seeded with `is_system = true`.
#[derive(Debug, Clone)]
pub struct SystemRole {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub resource_keys: Vec<&'static str>,
}

pub fn system_roles() -> Vec<SystemRole> {
    let everything = catalog_keys();
    let without_system = everything
        .iter()
        .copied()
        .filter(|key| *key != Resource::SystemManagement.as_str())
        .collect();

    let operations = [
        Resource::CustomerService,
        Resource::OrderManagement,
        Resource::ReviewManagement,
        Resource::AsManagement,
    ];
    let mut manager = vec![Resource::Dashboard.as_str()];
    for category in operations {
        manager.extend(detailed_keys_of(category));
    }
    manager.extend([
        Resource::InventoryManagement.as_str(),
        Resource::MasterData.as_str(),
        Resource::PerformanceAnalytics.as_str(),
    ]);

    let mut cs_agent = vec![Resource::Dashboard.as_str()];
    cs_agent.extend(detailed_keys_of(Resource::CustomerService));
    cs_agent.push("order_management:status_check");
    cs_agent.extend(detailed_keys_of(Resource::ReviewManagement));
    cs_agent.push("as_management:request_management");

    let mut sales = vec![Resource::Dashboard.as_str()];
    sales.extend(detailed_keys_of(Resource::OrderManagement));
    sales.extend([
        Resource::PartnerManagement.as_str(),
        Resource::PerformanceAnalytics.as_str(),
    ]);

    vec![
        SystemRole {
            name: "SUPER_ADMIN",
            display_name: "Super administrator",
            description: "Every permission in the catalog",
            resource_keys: everything,
        },
        SystemRole {
            name: "ADMIN",
            display_name: "Administrator",
            description: "Everything except system management",
            resource_keys: without_system,
        },
        SystemRole {
            name: "MANAGER",
            display_name: "Manager",
            description: "Operations management",
            resource_keys: manager,
        },
        SystemRole {
            name: "CS_AGENT",
            display_name: "CS agent",
            description: "Customer service and after-service handling",
            resource_keys: cs_agent,
        },
        SystemRole {
            name: "SALES",
            display_name: "Sales",
            description: "Orders and partner management",
            resource_keys: sales,
        },
        SystemRole {
            name: "VIEWER",
            display_name: "Viewer",
            description: "Dashboard only",
            resource_keys: vec![Resource::Dashboard.as_str()],
        },
    ]
}
