//! HTML form payloads and their validation
//!
//! Each form deserializes leniently (every field a string, missing fields
//! empty) so a bad submission can be re-rendered with the values the user
//! typed. `validate` turns it into a typed input or the list of messages to
//! show above the form. Uniqueness rules are checked by the stores.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{Direction, MovementRequest, NewUser, ProductInput, Role, UserChanges, price_to_cents};
use crate::stock::MAX_MOVEMENT_QUANTITY;

pub type Validation<T> = Result<T, Vec<String>>;

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    if email.is_empty() {
        errors.push("Email é obrigatório".to_string());
    } else if !is_valid_email(email) {
        errors.push("Email inválido".to_string());
    } else if char_len(email) > 120 {
        errors.push("Email deve ter no máximo 120 caracteres".to_string());
    }
}

fn check_name(name: &str, errors: &mut Vec<String>) {
    if name.is_empty() {
        errors.push("Nome é obrigatório".to_string());
    } else if !(2..=100).contains(&char_len(name)) {
        errors.push("Nome deve ter entre 2 e 100 caracteres".to_string());
    }
}

fn check_new_password(password: &str, confirmation: &str, errors: &mut Vec<String>) {
    if char_len(password) < 6 {
        errors.push("Senha deve ter pelo menos 6 caracteres".to_string());
    }
    if confirmation.is_empty() {
        errors.push("Confirmação de senha é obrigatória".to_string());
    } else if password != confirmation {
        errors.push("Senhas devem ser iguais".to_string());
    }
}

fn parse_role(role: &str, errors: &mut Vec<String>) -> Role {
    match role {
        "" => Role::Regular,
        other => Role::from_str(other).unwrap_or_else(|_| {
            errors.push("Tipo de usuário inválido".to_string());
            Role::Regular
        }),
    }
}

/// Accepts `1234.5`, `1234,50` and `0`
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Decimal::ZERO);
    }
    let price = Decimal::from_str(&raw.replace(',', ".")).ok()?;
    price_to_cents(price).map(|_| price)
}

fn finish<T>(errors: Vec<String>, value: T) -> Validation<T> {
    if errors.is_empty() { Ok(value) } else { Err(errors) }
}

/// Any POST whose only payload is the CSRF token
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsrfForm {
    pub csrf_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub remember: Option<String>,
    pub csrf_token: String,
}

pub struct Credentials {
    pub email: String,
    pub password: String,
    pub remember: bool,
}

impl LoginForm {
    pub fn validate(&self) -> Validation<Credentials> {
        let mut errors = Vec::new();
        let email = self.email.trim();

        if email.is_empty() {
            errors.push("Email é obrigatório".to_string());
        } else if !is_valid_email(email) {
            errors.push("Email inválido".to_string());
        }
        if self.password.is_empty() {
            errors.push("Senha é obrigatória".to_string());
        }

        finish(
            errors,
            Credentials {
                email: email.to_string(),
                password: self.password.clone(),
                remember: self.remember.as_deref().is_some_and(|v| !v.is_empty()),
            },
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
    pub csrf_token: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Validation<NewUser> {
        let mut errors = Vec::new();
        let name = self.name.trim();
        let email = self.email.trim();

        check_name(name, &mut errors);
        check_email(email, &mut errors);
        if self.password.is_empty() {
            errors.push("Senha é obrigatória".to_string());
        }
        check_new_password(&self.password, &self.confirm_password, &mut errors);
        let role = parse_role(&self.role, &mut errors);

        finish(
            errors,
            NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password: self.password.clone(),
                role,
            },
        )
    }
}

/// Editing an account; a blank password keeps the current one
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserEditForm {
    pub name: String,
    pub email: String,
    pub role: String,
    pub password: String,
    pub confirm_password: String,
    pub csrf_token: String,
}

impl UserEditForm {
    pub fn validate(&self) -> Validation<UserChanges> {
        let mut errors = Vec::new();
        let name = self.name.trim();
        let email = self.email.trim();

        check_name(name, &mut errors);
        check_email(email, &mut errors);
        let role = parse_role(&self.role, &mut errors);

        let password = if self.password.is_empty() && self.confirm_password.is_empty() {
            None
        } else {
            check_new_password(&self.password, &self.confirm_password, &mut errors);
            Some(self.password.clone())
        };

        finish(
            errors,
            UserChanges {
                name: name.to_string(),
                email: email.to_string(),
                role,
                password,
            },
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProductForm {
    pub code: String,
    pub name: String,
    pub description: String,
    pub min_stock: String,
    pub price: String,
    pub category_id: String,
    pub csrf_token: String,
}

impl Default for ProductForm {
    fn default() -> Self {
        Self {
            code: String::new(),
            name: String::new(),
            description: String::new(),
            min_stock: "10".to_string(),
            price: "0.00".to_string(),
            category_id: String::new(),
            csrf_token: String::new(),
        }
    }
}

impl ProductForm {
    pub fn validate(&self) -> Validation<ProductInput> {
        let mut errors = Vec::new();
        let code = self.code.trim();
        let name = self.name.trim();

        if code.is_empty() {
            errors.push("Código é obrigatório".to_string());
        } else if char_len(code) > 50 {
            errors.push("Código deve ter entre 1 e 50 caracteres".to_string());
        }
        check_name(name, &mut errors);

        let min_stock = match self.min_stock.trim() {
            "" => {
                errors.push("Estoque mínimo é obrigatório".to_string());
                0
            }
            raw => match raw.parse::<i64>() {
                Ok(n) if n >= 0 => n,
                Ok(_) => {
                    errors.push("Estoque mínimo deve ser maior ou igual a zero".to_string());
                    0
                }
                Err(_) => {
                    errors.push("Estoque mínimo deve ser um número inteiro".to_string());
                    0
                }
            },
        };

        let price = parse_price(&self.price).unwrap_or_else(|| {
            errors.push("Preço deve ser um valor maior ou igual a zero, com até duas casas decimais".to_string());
            Decimal::ZERO
        });

        let category_id = match self.category_id.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("Categoria inválida".to_string());
                    None
                }
            },
        };

        finish(
            errors,
            ProductInput {
                code: code.to_string(),
                name: name.to_string(),
                description: self.description.trim().to_string(),
                min_stock,
                price,
                category_id,
            },
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MovementForm {
    pub product_id: String,
    pub direction: String,
    pub quantity: String,
    pub note: String,
    pub csrf_token: String,
}

impl MovementForm {
    pub fn validate(&self) -> Validation<MovementRequest> {
        let mut errors = Vec::new();

        let product_id = match self.product_id.trim().parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                errors.push("Produto é obrigatório".to_string());
                0
            }
        };

        let direction = match self.direction.as_str() {
            "" => {
                errors.push("Tipo de movimentação é obrigatório".to_string());
                Direction::Entry
            }
            raw => Direction::from_str(raw).unwrap_or_else(|_| {
                errors.push("Tipo de movimentação inválido".to_string());
                Direction::Entry
            }),
        };

        let quantity = match self.quantity.trim() {
            "" => {
                errors.push("Quantidade é obrigatória".to_string());
                0
            }
            raw => match raw.parse::<i64>() {
                Ok(n) if (1..=MAX_MOVEMENT_QUANTITY).contains(&n) => n,
                Ok(n) if n > MAX_MOVEMENT_QUANTITY => {
                    errors.push("Quantidade excede o limite permitido".to_string());
                    0
                }
                _ => {
                    errors.push("Quantidade deve ser maior que zero".to_string());
                    0
                }
            },
        };

        finish(
            errors,
            MovementRequest {
                product_id,
                direction,
                quantity,
                note: self.note.trim().to_string(),
            },
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
    pub description: String,
    pub csrf_token: String,
}

impl CategoryForm {
    pub fn validate(&self) -> Validation<(String, String)> {
        let mut errors = Vec::new();
        let name = self.name.trim();

        if name.is_empty() {
            errors.push("Nome é obrigatório".to_string());
        } else if char_len(name) > 50 {
            errors.push("Nome deve ter no máximo 50 caracteres".to_string());
        }

        finish(errors, (name.to_string(), self.description.trim().to_string()))
    }
}
