//! Label and annotation keys shared by the route reconciler and the objects it writes.

/// Label a Service must carry (with value `"true"`) to be routed
pub const ROUTING_ENABLED_LABEL: &str = "routing.lab.io/enabled";

/// Label (or annotation) overriding the host component of the route
pub const ROUTING_HOST_KEY: &str = "routing.lab.io/host";

/// Label (or annotation) overriding the backend port, by number or port name
pub const ROUTING_PORT_KEY: &str = "routing.lab.io/port";

/// Namespace label carrying the region code
pub const REGION_LABEL: &str = "topology.lab.io/region";

/// Standard label for the tool managing a resource
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on generated routes
pub const MANAGED_BY_LABCTL: &str = "labctl";

/// Label on a generated route naming the Service it was derived from
pub const ROUTE_SOURCE_SERVICE_LABEL: &str = "routing.lab.io/service";

/// Field manager used for every server-side apply
pub const FIELD_MANAGER: &str = "labctl";
