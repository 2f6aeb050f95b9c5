//! Neutron router interfaces
//!
//! An interface is the router port on a subnet. Neutron has no interface
//! collection: interfaces are listed through the router's ports and added
//! with the `add_router_interface` action.

use crate::client::{OpenStackClient, Request};
use crate::error::{ClientError, Result};
use crate::wire::{relation, require, str_field};
use reqwest::Method;
use seeder_cloud::{Filter, Record, ResourceKind, ServiceType};
use serde_json::{Value, json};

const INTERFACE_OWNER: &str = "network:router_interface";

impl OpenStackClient {
    pub(crate) async fn list_router_interfaces(&self, filter: &Filter) -> Result<Vec<Record>> {
        let kind = ResourceKind::RouterInterface;
        let router = filter
            .get("router_id")
            .ok_or(ClientError::missing(kind, "router_id"))?;
        let req = Request::get(ServiceType::Network, "ports")
            .query("device_id", router)
            .query("device_owner", INTERFACE_OWNER);
        let ports = self.list_pages(req, "ports").await?;

        let mut records = Vec::new();
        for port in &ports {
            records.extend(port_interfaces(router, port)?);
        }
        Ok(records)
    }

    pub(crate) async fn add_router_interface(&self, payload: &Value) -> Result<Record> {
        let kind = ResourceKind::RouterInterface;
        let router = require(kind, payload, "router_id")?;
        let subnet = require(kind, payload, "subnet_id")?;
        let req = Request::new(
            ServiceType::Network,
            Method::PUT,
            format!("routers/{}/add_router_interface", router),
        )
        .json(json!({ "subnet_id": subnet }));
        let body = self.send_json(&req).await?;
        interface(&router, &subnet, str_field(&body, "port_id"))
    }
}

/// One interface per fixed IP of a router port
fn port_interfaces(router: &str, port: &Value) -> Result<Vec<Record>> {
    let port_id = str_field(port, "id");
    port.get("fixed_ips")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|ip| str_field(ip, "subnet_id"))
        .map(|subnet| interface(router, &subnet, port_id.clone()))
        .collect()
}

fn interface(router: &str, subnet: &str, port_id: Option<String>) -> Result<Record> {
    relation(
        ResourceKind::RouterInterface,
        &[router, subnet],
        json!({ "router_id": router, "subnet_id": subnet, "port_id": port_id }),
    )
}
