//! Huawei MA5600 CLI command builders
//!
//! These produce the exact strings shown to the operator as the audit trace
//! of a registration.

use crate::parser::Fsp;

/// Enter the GPON board interface owning the port
pub fn interface_gpon(fsp: Fsp) -> String {
    format!("interface gpon {}/{}", fsp.frame, fsp.slot)
}

pub fn quit() -> String {
    "quit".to_string()
}

/// Parameters for an `ont add` issued inside the board interface
#[derive(Debug, Clone)]
pub struct OntAdd<'a> {
    pub port: u32,
    pub ont_id: u32,
    pub sn: &'a str,
    pub line_profile_id: u32,
    pub srv_profile_id: u32,
    pub description: &'a str,
}

impl OntAdd<'_> {
    pub fn render(&self) -> String {
        let mut cmd = format!(
            "ont add {} {} sn-auth \"{}\" omci ont-lineprofile-id {} ont-srvprofile-id {}",
            self.port, self.ont_id, self.sn, self.line_profile_id, self.srv_profile_id
        );
        let desc = sanitize_description(self.description);
        if !desc.is_empty() {
            cmd.push_str(&format!(" desc \"{}\"", desc));
        }
        cmd
    }
}

/// Parameters for a global-config `service-port`
#[derive(Debug, Clone)]
pub struct ServicePort {
    pub index: u32,
    pub vlan: u16,
    pub fsp: Fsp,
    pub ont_id: u32,
    pub gemport: u32,
    pub user_vlan: u32,
}

impl ServicePort {
    pub fn render(&self) -> String {
        format!(
            "service-port {} vlan {} gpon {} ont {} gemport {} multi-service user-vlan {} tag-transform translate",
            self.index, self.vlan, self.fsp, self.ont_id, self.gemport, self.user_vlan
        )
    }
}

/// The OLT rejects quotes inside `desc` and truncates it at 64 characters
fn sanitize_description(desc: &str) -> String {
    desc.chars().filter(|c| *c != '"').take(64).collect::<String>().trim().to_string()
}
