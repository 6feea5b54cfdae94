//! Local service-name lookup for summary labels. A static table instead of a
//! getservbyport call keeps the lookup allocation-free and identical across
//! platforms; it is cosmetic only and never touches the network.

/// Well-known service name for a TCP port, if the table knows it.
pub fn service_name(port: u16) -> Option<&'static str> {
    Some(match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 => "http",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        389 => "ldap",
        443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        514 => "syslog",
        587 => "submission",
        636 => "ldaps",
        853 => "domain-s",
        993 => "imaps",
        995 => "pop3s",
        1433 => "ms-sql-s",
        1521 => "oracle",
        2049 => "nfs",
        2375 => "docker",
        3128 => "squid-http",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        4369 => "epmd",
        5000 => "upnp",
        5432 => "postgresql",
        5672 => "amqp",
        5900 => "vnc",
        5901 => "vnc-1",
        5985 => "wsman",
        6379 => "redis",
        8000 => "http-alt",
        8080 => "http-proxy",
        8443 => "https-alt",
        8888 => "sun-answerbook",
        9200 => "elasticsearch",
        11211 => "memcache",
        15672 => "rabbitmq-mgmt",
        25565 => "minecraft",
        27017 => "mongod",
        27018 => "mongod-shard",
        27019 => "mongod-config",
        _ => return None,
    })
}

/// `80/http` when the service is known, plain `80` otherwise.
pub fn port_label(port: u16) -> String {
    match service_name(port) {
        Some(name) => format!("{port}/{name}"),
        None => port.to_string(),
    }
}
