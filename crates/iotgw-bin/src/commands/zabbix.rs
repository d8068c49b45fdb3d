// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `zabbix-template` command.
//!
//! Renders a Zabbix 5.0 XML export with one SNMP item per object in the
//! gateway's OID table, plus triggers and graphs for the usual alarms.
//! Passphrases are left as macros to be filled in after import.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use iotgw_core::{MetricsCollector, ObjectId, OidTable};

use crate::cli::{AuthProtocol, Cli, PrivProtocol, SecurityLevel, ZabbixArgs};
use crate::error::{BinError, BinResult};

const TEMPLATE_NAME: &str = "OPC UA Gateway SNMP Template";
const TEMPLATE_DESCRIPTION: &str = "Template to monitor the OPC UA Gateway via SNMP";
const EXPORT_VERSION: &str = "5.0";

/// Writes the template to `--output`, or stdout when omitted.
pub fn zabbix_template(_cli: &Cli, args: ZabbixArgs) -> BinResult<()> {
    let table = OidTable::new(MetricsCollector::shared());
    let xml = render_template(&table, &args, Utc::now());

    let Some(path) = &args.output else {
        print!("{xml}");
        return Ok(());
    };

    std::fs::write(path, &xml).map_err(|e| {
        BinError::Io(format!("Failed to write {}: {e}", path.display()))
    })?;
    tracing::info!(path = %path.display(), items = table.len(), "Zabbix template written");

    println!("Zabbix template generated in: {}", path.display());
    println!("It contains {} SNMP items. Import it under Configuration > Templates > Import.", table.len());
    println!();
    if args.snmp_version.uses_community() {
        println!("SNMPv{} community macro: {{$SNMP_COMMUNITY}} (default: {})", args.snmp_version.label(), args.community);
        println!("SNMPv3 is recommended in production.");
    } else {
        println!("SNMPv3 user {} at level {}", args.user, level_label(args.level));
        println!("Set {{$SNMP_AUTH_PASSPHRASE}} and {{$SNMP_PRIV_PASSPHRASE}} in Zabbix after importing.");
    }
    Ok(())
}

// =============================================================================
// Item metadata
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct ItemMeta {
    key: &'static str,
    units: &'static str,
    value_type: &'static str,
    application: &'static str,
    multiplier: Option<&'static str>,
}

const fn counter(key: &'static str, application: &'static str) -> ItemMeta {
    ItemMeta {
        key,
        units: "",
        value_type: "UNSIGNED",
        application,
        multiplier: None,
    }
}

const fn millis(key: &'static str, application: &'static str) -> ItemMeta {
    ItemMeta {
        units: "ms",
        ..counter(key, application)
    }
}

/// Zabbix key, units and scaling for an object, by its `(group, index)` arcs.
fn item_meta(oid: &ObjectId) -> Option<ItemMeta> {
    let [.., group, index] = oid.arcs() else {
        return None;
    };
    let meta = match (*group, *index) {
        (1, 1) => counter("opcua.connections", "OPC UA"),
        (1, 2) => counter("opcua.errors", "OPC UA"),
        (1, 3) => counter("opcua.reconnects", "OPC UA"),
        (1, 4) => counter("opcua.requests", "OPC UA"),
        (1, 5) => counter("opcua.requests.errors", "OPC UA"),
        (1, 6) => counter("opcua.operations.read", "OPC UA"),
        (1, 7) => counter("opcua.operations.write", "OPC UA"),
        (1, 8) => millis("opcua.response.time.last", "OPC UA"),
        (1, 9) => millis("opcua.response.time.avg", "OPC UA"),
        (2, 1) => counter("http.requests", "HTTP"),
        (2, 2) => counter("http.errors", "HTTP"),
        (2, 3) => counter("http.status.2xx", "HTTP"),
        (2, 4) => counter("http.status.3xx", "HTTP"),
        (2, 5) => counter("http.status.4xx", "HTTP"),
        (2, 6) => counter("http.status.5xx", "HTTP"),
        (2, 7) => millis("http.response.time.last", "HTTP"),
        (2, 8) => millis("http.response.time.avg", "HTTP"),
        (2, 9) => counter("http.ratelimit", "HTTP"),
        // The agent serves percentages * 100 and memory in MB.
        (3, 1) => ItemMeta {
            units: "%",
            value_type: "FLOAT",
            multiplier: Some("0.01"),
            ..counter("system.cpu.usage", "System")
        },
        (3, 2) => ItemMeta {
            units: "%",
            value_type: "FLOAT",
            multiplier: Some("0.01"),
            ..counter("system.memory.usage", "System")
        },
        (3, 3) => ItemMeta {
            units: "B",
            multiplier: Some("1048576"),
            ..counter("system.memory.total", "System")
        },
        (3, 4) => ItemMeta {
            units: "B",
            multiplier: Some("1048576"),
            ..counter("system.memory.free", "System")
        },
        (3, 5) => ItemMeta {
            units: "uptime",
            ..counter("system.uptime", "System")
        },
        _ => return None,
    };
    Some(meta)
}

fn level_label(level: SecurityLevel) -> &'static str {
    match level {
        SecurityLevel::NoAuthNoPriv => "noAuthNoPriv",
        SecurityLevel::AuthNoPriv => "authNoPriv",
        SecurityLevel::AuthPriv => "authPriv",
    }
}

fn level_export(level: SecurityLevel) -> &'static str {
    match level {
        SecurityLevel::NoAuthNoPriv => "NOAUTHNOPRIV",
        SecurityLevel::AuthNoPriv => "AUTHNOPRIV",
        SecurityLevel::AuthPriv => "AUTHPRIV",
    }
}

fn auth_export(auth: AuthProtocol) -> &'static str {
    match auth {
        AuthProtocol::Md5 => "MD5",
        AuthProtocol::Sha1 => "SHA1",
        AuthProtocol::Sha224 => "SHA224",
        AuthProtocol::Sha256 => "SHA256",
        AuthProtocol::Sha384 => "SHA384",
        AuthProtocol::Sha512 => "SHA512",
    }
}

fn priv_export(privacy: PrivProtocol) -> &'static str {
    match privacy {
        PrivProtocol::Des => "DES",
        PrivProtocol::Aes128 => "AES128",
        PrivProtocol::Aes192 => "AES192",
        PrivProtocol::Aes256 => "AES256",
        PrivProtocol::Aes192c => "AES192C",
        PrivProtocol::Aes256c => "AES256C",
    }
}

// =============================================================================
// Rendering
// =============================================================================

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

struct Trigger {
    expression: &'static str,
    name: &'static str,
    priority: &'static str,
    description: &'static str,
}

const TRIGGERS: [Trigger; 5] = [
    Trigger {
        expression: "system.cpu.usage.last()}>90",
        name: "CPU usage is too high",
        priority: "WARNING",
        description: "CPU usage is above 90%",
    },
    Trigger {
        expression: "system.memory.usage.last()}>90",
        name: "Memory usage is too high",
        priority: "WARNING",
        description: "Memory usage is above 90%",
    },
    Trigger {
        expression: "opcua.connections.last()}=0",
        name: "No OPC UA connections",
        priority: "HIGH",
        description: "No active OPC UA connections",
    },
    Trigger {
        expression: "opcua.errors.diff()}>10",
        name: "High rate of OPC UA errors",
        priority: "AVERAGE",
        description: "High rate of OPC UA errors",
    },
    Trigger {
        expression: "http.status.5xx.diff()}>10",
        name: "High rate of HTTP 5xx errors",
        priority: "AVERAGE",
        description: "High rate of HTTP 5xx errors",
    },
];

const GRAPHS: [(&str, &[&str]); 3] = [
    ("OPC UA Statistics", &["opcua.requests", "opcua.errors", "opcua.connections"]),
    ("HTTP Statistics", &["http.requests", "http.errors", "http.status.2xx"]),
    ("System Resources", &["system.cpu.usage", "system.memory.usage"]),
];

const GRAPH_COLORS: [&str; 3] = ["1A7C11", "F63100", "2774A4"];

/// Renders the template for every object in `table`.
///
/// Objects without known metadata are exported under a key derived from
/// their OID so a larger table still produces a complete template.
pub(crate) fn render_template(
    table: &OidTable,
    args: &ZabbixArgs,
    generated: DateTime<Utc>,
) -> String {
    let mut xml = String::new();
    let name = escape(TEMPLATE_NAME);

    // Writing into a String never fails.
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(xml, "<zabbix_export>");
    let _ = writeln!(xml, "  <version>{EXPORT_VERSION}</version>");
    let _ = writeln!(xml, "  <date>{}</date>", generated.to_rfc3339_opts(SecondsFormat::Secs, true));
    let _ = writeln!(xml, "  <groups>\n    <group>\n      <name>Templates/Applications</name>\n    </group>\n  </groups>");
    let _ = writeln!(xml, "  <templates>\n    <template>");
    let _ = writeln!(xml, "      <template>{name}</template>");
    let _ = writeln!(xml, "      <name>{name}</name>");
    let _ = writeln!(xml, "      <description>{}</description>", escape(TEMPLATE_DESCRIPTION));
    let _ = writeln!(xml, "      <groups>\n        <group>\n          <name>Templates/Applications</name>\n        </group>\n      </groups>");
    let _ = writeln!(xml, "      <applications>");
    for application in ["OPC UA", "HTTP", "System"] {
        let _ = writeln!(xml, "        <application>\n          <name>{application}</name>\n        </application>");
    }
    let _ = writeln!(xml, "      </applications>");

    let _ = writeln!(xml, "      <items>");
    for (oid, description) in table.describe() {
        let object: Option<ObjectId> = oid.parse().ok();
        let meta = object.as_ref().and_then(item_meta);
        render_item(&mut xml, &oid, description, meta, args);
    }
    let _ = writeln!(xml, "      </items>");

    let _ = writeln!(xml, "      <macros>");
    if args.snmp_version.uses_community() {
        render_macro(
            &mut xml,
            "{$SNMP_COMMUNITY}",
            &args.community,
            &format!("SNMP community for SNMPv{}", args.snmp_version.label()),
        );
    } else {
        render_macro(&mut xml, "{$SNMP_AUTH_PASSPHRASE}", "", "Authentication password for SNMPv3");
        render_macro(&mut xml, "{$SNMP_PRIV_PASSPHRASE}", "", "Privacy password for SNMPv3");
    }
    let _ = writeln!(xml, "      </macros>");
    let _ = writeln!(xml, "    </template>\n  </templates>");

    let _ = writeln!(xml, "  <triggers>");
    for trigger in &TRIGGERS {
        let _ = writeln!(xml, "    <trigger>");
        let _ = writeln!(
            xml,
            "      <expression>{}</expression>",
            escape(&format!("{{{}:{}", TEMPLATE_NAME, trigger.expression))
        );
        let _ = writeln!(xml, "      <name>{}</name>", escape(trigger.name));
        let _ = writeln!(xml, "      <priority>{}</priority>", trigger.priority);
        let _ = writeln!(xml, "      <description>{}</description>", escape(trigger.description));
        let _ = writeln!(xml, "    </trigger>");
    }
    let _ = writeln!(xml, "  </triggers>");

    let _ = writeln!(xml, "  <graphs>");
    for (graph, keys) in GRAPHS {
        let _ = writeln!(xml, "    <graph>\n      <name>{}</name>\n      <graph_items>", escape(graph));
        for (sortorder, (key, color)) in keys.iter().zip(GRAPH_COLORS).enumerate() {
            let _ = writeln!(xml, "        <graph_item>");
            if sortorder > 0 {
                let _ = writeln!(xml, "          <sortorder>{sortorder}</sortorder>");
            }
            let _ = writeln!(xml, "          <color>{color}</color>");
            let _ = writeln!(xml, "          <item>\n            <host>{name}</host>\n            <key>{key}</key>\n          </item>");
            let _ = writeln!(xml, "        </graph_item>");
        }
        let _ = writeln!(xml, "      </graph_items>\n    </graph>");
    }
    let _ = writeln!(xml, "  </graphs>");
    let _ = writeln!(xml, "</zabbix_export>");
    xml
}

fn render_item(
    xml: &mut String,
    oid: &str,
    description: &str,
    meta: Option<ItemMeta>,
    args: &ZabbixArgs,
) {
    let fallback_key = format!("iotgw.oid[{oid}]");
    let (key, units, value_type, application, multiplier) = match &meta {
        Some(m) => (m.key, m.units, m.value_type, m.application, m.multiplier),
        None => (fallback_key.as_str(), "", "UNSIGNED", "System", None),
    };

    let _ = writeln!(xml, "        <item>");
    let _ = writeln!(xml, "          <name>{}</name>", escape(description));
    let _ = writeln!(xml, "          <type>SNMP_AGENT</type>");
    // GET addresses the scalar instance.
    let _ = writeln!(xml, "          <snmp_oid>{oid}.0</snmp_oid>");
    let _ = writeln!(xml, "          <key>{}</key>", escape(key));
    let _ = writeln!(xml, "          <delay>60s</delay>");
    let _ = writeln!(xml, "          <history>90d</history>");
    let _ = writeln!(xml, "          <trends>365d</trends>");
    let _ = writeln!(xml, "          <status>ENABLED</status>");
    let _ = writeln!(xml, "          <value_type>{value_type}</value_type>");
    let _ = writeln!(xml, "          <units>{units}</units>");

    if args.snmp_version.uses_community() {
        let _ = writeln!(xml, "          <snmp_community>{{$SNMP_COMMUNITY}}</snmp_community>");
    } else {
        let _ = writeln!(xml, "          <snmpv3_contextname/>");
        let _ = writeln!(xml, "          <snmpv3_securityname>{}</snmpv3_securityname>", escape(&args.user));
        let _ = writeln!(xml, "          <snmpv3_securitylevel>{}</snmpv3_securitylevel>", level_export(args.level));
        if args.level != SecurityLevel::NoAuthNoPriv {
            let _ = writeln!(xml, "          <snmpv3_authprotocol>{}</snmpv3_authprotocol>", auth_export(args.auth));
            let _ = writeln!(xml, "          <snmpv3_authpassphrase>{{$SNMP_AUTH_PASSPHRASE}}</snmpv3_authpassphrase>");
        }
        if args.level == SecurityLevel::AuthPriv {
            let _ = writeln!(xml, "          <snmpv3_privprotocol>{}</snmpv3_privprotocol>", priv_export(args.privacy));
            let _ = writeln!(xml, "          <snmpv3_privpassphrase>{{$SNMP_PRIV_PASSPHRASE}}</snmpv3_privpassphrase>");
        }
    }

    let _ = writeln!(xml, "          <applications>\n            <application>\n              <name>{application}</name>\n            </application>\n          </applications>");
    if let Some(factor) = multiplier {
        let _ = writeln!(xml, "          <preprocessing>\n            <step>\n              <type>MULTIPLIER</type>\n              <params>{factor}</params>\n            </step>\n          </preprocessing>");
    }
    let _ = writeln!(xml, "        </item>");
}

fn render_macro(xml: &mut String, name: &str, value: &str, description: &str) {
    let _ = writeln!(xml, "        <macro>");
    let _ = writeln!(xml, "          <macro>{name}</macro>");
    if value.is_empty() {
        let _ = writeln!(xml, "          <value/>");
    } else {
        let _ = writeln!(xml, "          <value>{}</value>", escape(value));
    }
    let _ = writeln!(xml, "          <description>{}</description>", escape(description));
    let _ = writeln!(xml, "        </macro>");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SnmpVersion;
    use chrono::TimeZone;

    fn render(args: &ZabbixArgs) -> String {
        let table = OidTable::new(MetricsCollector::shared());
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        render_template(&table, args, at)
    }

    #[test]
    fn test_every_object_has_an_item() {
        let table = OidTable::new(MetricsCollector::shared());
        let xml = render(&ZabbixArgs::default());

        assert_eq!(xml.matches("\n        <item>\n").count(), table.len());
        for entry in table.entries() {
            assert!(item_meta(&entry.oid).is_some(), "no metadata for {}", entry.oid);
            assert!(xml.contains(&format!("<snmp_oid>{}</snmp_oid>", entry.instance())));
        }
        assert!(xml.contains("<snmp_oid>1.3.6.1.4.1.12345.1.1.1.0</snmp_oid>"));
        assert!(xml.contains("<key>opcua.connections</key>"));
        assert!(xml.contains("<key>system.uptime</key>"));
        assert!(xml.contains("<date>2025-03-01T12:00:00Z</date>"));
    }

    #[test]
    fn test_v3_security_fields_and_macros() {
        let args = ZabbixArgs {
            user: "zabbix".to_string(),
            auth: AuthProtocol::Sha512,
            privacy: PrivProtocol::Aes256,
            ..ZabbixArgs::default()
        };
        let xml = render(&args);

        assert!(xml.contains("<snmpv3_securityname>zabbix</snmpv3_securityname>"));
        assert!(xml.contains("<snmpv3_securitylevel>AUTHPRIV</snmpv3_securitylevel>"));
        assert!(xml.contains("<snmpv3_authprotocol>SHA512</snmpv3_authprotocol>"));
        assert!(xml.contains("<snmpv3_privprotocol>AES256</snmpv3_privprotocol>"));
        assert!(xml.contains("<macro>{$SNMP_AUTH_PASSPHRASE}</macro>"));
        assert!(xml.contains("<macro>{$SNMP_PRIV_PASSPHRASE}</macro>"));
        assert!(!xml.contains("snmp_community"));
    }

    #[test]
    fn test_auth_no_priv_omits_privacy() {
        let args = ZabbixArgs {
            level: SecurityLevel::AuthNoPriv,
            ..ZabbixArgs::default()
        };
        let xml = render(&args);

        assert!(xml.contains("<snmpv3_authprotocol>SHA256</snmpv3_authprotocol>"));
        assert!(!xml.contains("<snmpv3_privprotocol>"));
    }

    #[test]
    fn test_community_versions_use_macro() {
        let args = ZabbixArgs {
            snmp_version: SnmpVersion::V2c,
            community: "plant".to_string(),
            ..ZabbixArgs::default()
        };
        let xml = render(&args);

        assert!(xml.contains("<snmp_community>{$SNMP_COMMUNITY}</snmp_community>"));
        assert!(xml.contains("<value>plant</value>"));
        assert!(xml.contains("SNMP community for SNMPv2c"));
        assert!(!xml.contains("snmpv3_"));
    }

    #[test]
    fn test_scaled_objects_have_preprocessing() {
        let xml = render(&ZabbixArgs::default());
        assert_eq!(xml.matches("<type>MULTIPLIER</type>").count(), 4);
        assert!(xml.contains("<params>0.01</params>"));
        assert!(xml.contains("<params>1048576</params>"));
    }

    #[test]
    fn test_triggers_are_escaped() {
        let xml = render(&ZabbixArgs::default());
        assert!(xml.contains(
            "<expression>{OPC UA Gateway SNMP Template:system.cpu.usage.last()}&gt;90</expression>"
        ));
        assert!(xml.contains("<name>No OPC UA connections</name>"));
    }

    #[test]
    fn test_user_input_is_escaped() {
        let args = ZabbixArgs {
            user: "a<b&c".to_string(),
            ..ZabbixArgs::default()
        };
        let xml = render(&args);
        assert!(xml.contains("<snmpv3_securityname>a&lt;b&amp;c</snmpv3_securityname>"));
    }

    #[test]
    fn test_writes_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zabbix_template.xml");
        let cli = Cli {
            config: None,
            log_level: None,
            log_format: None,
            command: None,
        };
        let args = ZabbixArgs {
            output: Some(path.clone()),
            ..ZabbixArgs::default()
        };

        zabbix_template(&cli, args).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(written.trim_end().ends_with("</zabbix_export>"));
    }
}
