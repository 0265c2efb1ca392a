use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Istio VirtualService, reduced to the fields the route reconciler writes
///
/// The CRD itself is installed and owned by Istio; this type is only used to
/// build and server-side apply route objects.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "VirtualService",
    namespaced,
    derive = "PartialEq"
)]
pub struct VirtualServiceSpec {
    /// External hostnames this route answers for
    pub hosts: Vec<String>,

    /// Gateways ("namespace/name") the route is bound to
    #[serde(default)]
    pub gateways: Vec<String>,

    /// HTTP routing rules, evaluated in order
    #[serde(default)]
    pub http: Vec<HttpRoute>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct HttpRoute {
    /// Weighted destinations for matching traffic
    pub route: Vec<HttpRouteDestination>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct HttpRouteDestination {
    pub destination: Destination,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Destination {
    /// Service name (short names resolve in the route's namespace)
    pub host: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortSelector>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct PortSelector {
    pub number: u32,
}

impl VirtualServiceSpec {
    /// Spec routing every request on `hosts` through `gateway` to a single backend
    pub fn single_backend(host: String, gateway: String, service: &str, port: u16) -> Self {
        VirtualServiceSpec {
            hosts: vec![host],
            gateways: vec![gateway],
            http: vec![HttpRoute {
                route: vec![HttpRouteDestination {
                    destination: Destination {
                        host: service.to_string(),
                        port: Some(PortSelector {
                            number: u32::from(port),
                        }),
                    },
                    weight: None,
                }],
            }],
        }
    }

    /// Backend as `service:port` of the first destination, if any
    pub fn primary_backend(&self) -> Option<String> {
        let destination = &self.http.first()?.route.first()?.destination;
        match &destination.port {
            Some(port) => Some(format!("{}:{}", destination.host, port.number)),
            None => Some(destination.host.clone()),
        }
    }
}

#[cfg(test)]
#[path = "virtual_service_test.rs"]
mod tests;
