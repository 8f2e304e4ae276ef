//! Account management over the triplestore.
//!
//! Users and their API keys live in a dedicated named graph. Passwords
//! are stored as salted SHA-256 digests.

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use triplify_common::{Result, TriplifyError};
use triplify_store::builder::{bool_literal, string_literal, QueryBuilder};
use triplify_store::client::{Row, SparqlClient};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub salt: String,
    pub password_hash: String,
    pub admin: bool,
    pub blocked: bool,
}

/// Public view of an account, for the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub admin: bool,
    pub blocked: bool,
}

pub struct UserStore<'a> {
    client: &'a SparqlClient,
    builder: &'a QueryBuilder,
    graph: String,
    namespace: String,
}

impl<'a> UserStore<'a> {
    pub fn new(client: &'a SparqlClient, builder: &'a QueryBuilder, internal_namespace: &str) -> Self {
        let mut namespace = internal_namespace.to_string();
        if !namespace.ends_with('/') && !namespace.ends_with('#') {
            namespace.push('/');
        }
        Self {
            client,
            builder,
            graph: format!("{}graph/users", namespace),
            namespace,
        }
    }

    fn user_uri(&self, username: &str) -> String {
        format!("{}user/{}", self.namespace, triplify_common::uri::encode(username))
    }

    async fn insert(&self, ttl: &str) -> Result<()> {
        let header = self.builder.prefixes().sparql_header(ttl);
        self.client.insert_data(ttl, &self.graph, &header).await
    }

    /// Usernames end up in URIs and queries; keep them simple.
    pub fn validate_username(username: &str) -> Result<()> {
        let re = Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").expect("static regex");
        if re.is_match(username) {
            Ok(())
        } else {
            Err(TriplifyError::Auth(
                "username may only contain letters, digits, '_', '.' and '-'".to_string(),
            ))
        }
    }

    pub fn validate_email(email: &str) -> bool {
        let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex");
        re.is_match(email)
    }

    pub async fn user_count(&self) -> Result<u64> {
        let query = self.builder.add_prefix_headers(&format!(
            "SELECT (COUNT(DISTINCT ?u) AS ?count)\n\
             WHERE {{ GRAPH <{g}> {{ ?u rdf:type triplify:User }} }}",
            g = self.graph,
        ));
        let rows = self.client.select(&query).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("count"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self.fetch(username).await?.is_some())
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.fetch_by_email(email).await?.is_some())
    }

    /// Create an account. The caller decides the admin flag (first user
    /// of a fresh deployment, usually).
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        admin: bool,
    ) -> Result<UserRecord> {
        Self::validate_username(username)?;
        let salt = Uuid::new_v4().simple().to_string();
        let password_hash = hash_password(&salt, password);
        let ttl = format!(
            "<{uri}> rdf:type triplify:User ;\n\
             \ttriplify:username {username_lit} ;\n\
             \tfoaf:mbox {email_lit} ;\n\
             \ttriplify:passwordSalt {salt_lit} ;\n\
             \ttriplify:passwordHash {hash_lit} ;\n\
             \ttriplify:isAdmin {admin_lit} ;\n\
             \ttriplify:isBlocked {blocked_lit} .",
            uri = self.user_uri(username),
            username_lit = string_literal(username),
            email_lit = string_literal(email),
            salt_lit = string_literal(&salt),
            hash_lit = string_literal(&password_hash),
            admin_lit = bool_literal(admin),
            blocked_lit = bool_literal(false),
        );
        self.insert(&ttl).await?;
        info!(username, admin, "user created");
        Ok(UserRecord {
            username: username.to_string(),
            email: email.to_string(),
            salt,
            password_hash,
            admin,
            blocked: false,
        })
    }

    fn record_from_row(mut row: Row) -> Option<UserRecord> {
        Some(UserRecord {
            username: row.remove("username")?,
            email: row.remove("email").unwrap_or_default(),
            salt: row.remove("salt").unwrap_or_default(),
            password_hash: row.remove("hash").unwrap_or_default(),
            admin: row.remove("admin").map(|v| v == "true" || v == "1").unwrap_or(false),
            blocked: row.remove("blocked").map(|v| v == "true" || v == "1").unwrap_or(false),
        })
    }

    async fn fetch_where(&self, clause: &str) -> Result<Option<UserRecord>> {
        let query = self.builder.add_prefix_headers(&format!(
            "SELECT ?username ?email ?salt ?hash ?admin ?blocked\n\
             WHERE {{\n\
             \tGRAPH <{g}> {{\n\
             \t\t?u rdf:type triplify:User ;\n\
             \t\t   triplify:username ?username ;\n\
             \t\t   foaf:mbox ?email ;\n\
             \t\t   triplify:passwordSalt ?salt ;\n\
             \t\t   triplify:passwordHash ?hash ;\n\
             \t\t   triplify:isAdmin ?admin ;\n\
             \t\t   triplify:isBlocked ?blocked .\n\
             \t\t{clause}\n\
             \t}}\n\
             }}",
            g = self.graph,
        ));
        let rows = self.client.select(&query).await?;
        Ok(rows.into_iter().next().and_then(Self::record_from_row))
    }

    pub async fn fetch(&self, username: &str) -> Result<Option<UserRecord>> {
        self.fetch_where(&format!(
            "FILTER(?username = {})",
            string_literal(username)
        ))
        .await
    }

    pub async fn fetch_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.fetch_where(&format!("FILTER(?email = {})", string_literal(email)))
            .await
    }

    pub async fn fetch_by_apikey(&self, apikey: &str) -> Result<Option<UserRecord>> {
        let query = self.builder.add_prefix_headers(&format!(
            "SELECT ?owner\n\
             WHERE {{\n\
             \tGRAPH <{g}> {{\n\
             \t\t?k rdf:type triplify:ApiKey ;\n\
             \t\t   triplify:key {key} ;\n\
             \t\t   dc:creator ?owner .\n\
             \t}}\n\
             }}",
            g = self.graph,
            key = string_literal(apikey),
        ));
        let rows = self.client.select(&query).await?;
        match rows.into_iter().next().and_then(|mut r| r.remove("owner")) {
            Some(owner) => self.fetch(&owner).await,
            None => Ok(None),
        }
    }

    pub fn verify_password(record: &UserRecord, password: &str) -> bool {
        hash_password(&record.salt, password) == record.password_hash
    }

    /// Register a named API key; returns the generated key.
    pub async fn add_apikey(&self, username: &str, keyname: &str) -> Result<String> {
        let key = Uuid::new_v4().simple().to_string();
        let ttl = format!(
            "<{uri}> rdf:type triplify:ApiKey ;\n\
             \trdfs:label {name_lit} ;\n\
             \ttriplify:key {key_lit} ;\n\
             \tdc:creator {owner_lit} .",
            uri = format!("{}apikey/{}", self.namespace, Uuid::new_v4()),
            name_lit = string_literal(keyname),
            key_lit = string_literal(&key),
            owner_lit = string_literal(username),
        );
        self.insert(&ttl).await?;
        debug!(username, keyname, "api key added");
        Ok(key)
    }

    /// Drop every key of a user and mint a fresh default one.
    pub async fn renew_apikey(&self, username: &str) -> Result<String> {
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE {{ GRAPH <{g}> {{ ?k ?p ?o }} }}\n\
             WHERE {{ GRAPH <{g}> {{\n\
             \t?k rdf:type triplify:ApiKey ; dc:creator {owner} ; ?p ?o .\n\
             }} }}",
            g = self.graph,
            owner = string_literal(username),
        ));
        self.client.update(&update).await?;
        self.add_apikey(username, "default").await
    }

    /// Keys of a user, as (label, key) pairs.
    pub async fn list_apikeys(&self, username: &str) -> Result<Vec<(String, String)>> {
        let query = self.builder.add_prefix_headers(&format!(
            "SELECT ?label ?key\n\
             WHERE {{ GRAPH <{g}> {{\n\
             \t?k rdf:type triplify:ApiKey ;\n\
             \t   rdfs:label ?label ;\n\
             \t   triplify:key ?key ;\n\
             \t   dc:creator {owner} .\n\
             }} }}\nORDER BY ?label",
            g = self.graph,
            owner = string_literal(username),
        ));
        let rows = self.client.select(&query).await?;
        Ok(rows
            .into_iter()
            .map(|mut r| {
                (
                    r.remove("label").unwrap_or_default(),
                    r.remove("key").unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn replace_property(&self, username: &str, property: &str, value: &str) -> Result<()> {
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE WHERE {{ GRAPH <{g}> {{ <{uri}> {property} ?v }} }}",
            g = self.graph,
            uri = self.user_uri(username),
        ));
        self.client.update(&update).await?;
        let ttl = format!("<{}> {} {} .", self.user_uri(username), property, value);
        self.insert(&ttl).await
    }

    pub async fn update_email(&self, username: &str, email: &str) -> Result<()> {
        self.replace_property(username, "foaf:mbox", &string_literal(email))
            .await
    }

    pub async fn update_password(&self, username: &str, password: &str) -> Result<()> {
        let salt = Uuid::new_v4().simple().to_string();
        let hash = hash_password(&salt, password);
        self.replace_property(username, "triplify:passwordSalt", &string_literal(&salt))
            .await?;
        self.replace_property(username, "triplify:passwordHash", &string_literal(&hash))
            .await
    }

    pub async fn set_blocked(&self, username: &str, blocked: bool) -> Result<()> {
        self.replace_property(username, "triplify:isBlocked", &bool_literal(blocked))
            .await
    }

    pub async fn set_admin(&self, username: &str, admin: bool) -> Result<()> {
        self.replace_property(username, "triplify:isAdmin", &bool_literal(admin))
            .await
    }

    /// Remove the account and its API keys. The caller is responsible
    /// for dropping the user's data graphs first.
    pub async fn delete_user(&self, username: &str) -> Result<()> {
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE {{ GRAPH <{g}> {{ ?k ?p ?o }} }}\n\
             WHERE {{ GRAPH <{g}> {{\n\
             \t?k rdf:type triplify:ApiKey ; dc:creator {owner} ; ?p ?o .\n\
             }} }}",
            g = self.graph,
            owner = string_literal(username),
        ));
        self.client.update(&update).await?;
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE WHERE {{ GRAPH <{g}> {{ <{uri}> ?p ?o }} }}",
            g = self.graph,
            uri = self.user_uri(username),
        ));
        self.client.update(&update).await?;
        info!(username, "user deleted");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let query = self.builder.add_prefix_headers(&format!(
            "SELECT ?username ?email ?admin ?blocked\n\
             WHERE {{ GRAPH <{g}> {{\n\
             \t?u rdf:type triplify:User ;\n\
             \t   triplify:username ?username ;\n\
             \t   foaf:mbox ?email ;\n\
             \t   triplify:isAdmin ?admin ;\n\
             \t   triplify:isBlocked ?blocked .\n\
             }} }}\nORDER BY ?username",
            g = self.graph,
        ));
        let rows = self.client.select(&query).await?;
        Ok(rows
            .into_iter()
            .map(|mut r| UserInfo {
                username: r.remove("username").unwrap_or_default(),
                email: r.remove("email").unwrap_or_default(),
                admin: r.remove("admin").map(|v| v == "true" || v == "1").unwrap_or(false),
                blocked: r.remove("blocked").map(|v| v == "true" || v == "1").unwrap_or(false),
            })
            .collect())
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashing_is_salted() {
        let a = hash_password("salt1", "secret");
        let b = hash_password("salt2", "secret");
        assert_ne!(a, b);
        assert_eq!(a, hash_password("salt1", "secret"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn password_verification_uses_the_stored_salt() {
        let record = UserRecord {
            username: "alice".to_string(),
            email: "a@example.org".to_string(),
            salt: "abc".to_string(),
            password_hash: hash_password("abc", "secret"),
            admin: false,
            blocked: false,
        };
        assert!(UserStore::verify_password(&record, "secret"));
        assert!(!UserStore::verify_password(&record, "wrong"));
    }

    #[test]
    fn usernames_are_restricted_to_safe_characters() {
        assert!(UserStore::validate_username("alice.b-2_c").is_ok());
        assert!(UserStore::validate_username("alice bob").is_err());
        assert!(UserStore::validate_username("x\" } DROP").is_err());
        assert!(UserStore::validate_username("").is_err());
    }

    #[test]
    fn email_validation_is_permissive_but_sane() {
        assert!(UserStore::validate_email("a@example.org"));
        assert!(!UserStore::validate_email("not-an-email"));
        assert!(!UserStore::validate_email("a b@example.org"));
    }
}
