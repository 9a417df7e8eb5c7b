//! API key minting
//!
//! Each deployment gets three HS256 tokens scoped to the Supabase roles,
//! signed with the deployment's shared JWT secret.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

const ISSUER: &str = "supabase";
const EXPIRY_DAYS: i64 = 10 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyClaims {
    pub iss: String,
    #[serde(rename = "ref")]
    pub project_ref: String,
    pub role: String,
    pub exp: i64,
}

/// The three role-scoped keys of one deployment.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    pub admin_api_key: String,
    pub anon_key: String,
    pub service_role_key: String,
}

/// Mint the role keys for a project with a 10-year expiry.
pub fn generate_api_keys(jwt_secret: &str, project_ref: &str) -> Result<ApiKeys, DeployError> {
    let exp = (Utc::now() + Duration::days(EXPIRY_DAYS)).timestamp();
    let key = EncodingKey::from_secret(jwt_secret.as_bytes());

    let mint = |role: &str| {
        let claims = ApiKeyClaims {
            iss: ISSUER.to_string(),
            project_ref: project_ref.to_string(),
            role: role.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &key)
    };

    Ok(ApiKeys {
        admin_api_key: mint("supabase_admin")?,
        anon_key: mint("anon")?,
        service_role_key: mint("service_role")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    fn claims_of(token: &str, secret: &str) -> ApiKeyClaims {
        decode::<ApiKeyClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims
    }

    #[test]
    fn keys_carry_role_scoped_claims() {
        let secret = "super-secret-jwt-token-with-at-least-32-characters-long";
        let keys = generate_api_keys(secret, "abc").unwrap();

        let anon = claims_of(&keys.anon_key, secret);
        assert_eq!(anon.iss, "supabase");
        assert_eq!(anon.project_ref, "abc");
        assert_eq!(anon.role, "anon");

        assert_eq!(claims_of(&keys.admin_api_key, secret).role, "supabase_admin");
        assert_eq!(claims_of(&keys.service_role_key, secret).role, "service_role");
    }

    #[test]
    fn expiry_is_roughly_ten_years_out() {
        let secret = "super-secret-jwt-token-with-at-least-32-characters-long";
        let keys = generate_api_keys(secret, "abc").unwrap();
        let claims = claims_of(&keys.anon_key, secret);
        let horizon = (Utc::now() + Duration::days(EXPIRY_DAYS)).timestamp();
        assert!((claims.exp - horizon).abs() < 60);
    }

    #[test]
    fn wrong_secret_fails_validation() {
        let keys = generate_api_keys("first-secret-that-is-32-characters!!", "abc").unwrap();
        let result = decode::<ApiKeyClaims>(
            &keys.anon_key,
            &DecodingKey::from_secret(b"other-secret-that-is-32-characters!!"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }
}
