// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::{Args, Parser, Subcommand};
use csv::Writer;
use chrono::{DateTime, NaiveDate, Utc};
use pos_ledger::money::{checked_total, line_amount};
use pos_ledger::{
    Actor, ClientChanges, ClientId, DebtId, DebtLineId, Engine, JsonLinesAuditLog, LedgerError,
    NewSale, PaymentType, ProductForm, ProductId, RecordRef, Role, SaleExtras, SaleId, SaleItem,
    Settings, Store, User, UserId,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// POS Ledger - inventory, sales and client debts for a small shop
///
/// Data lives in a JSON snapshot file; every change is appended to a
/// JSON-lines audit log.
#[derive(Parser, Debug)]
#[command(name = "pos-ledger")]
#[command(about = "Point-of-sale ledger with per-line debt tracking", long_about = None)]
struct Cli {
    /// Settings file (defaults to ./pos-ledger.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Ledger snapshot file, overrides the settings
    #[arg(long, value_name = "FILE", env = "POS_LEDGER_DATA")]
    data: Option<PathBuf>,

    /// User recorded in the audit log
    #[arg(long)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage clients
    #[command(subcommand)]
    Client(ClientCommand),
    /// Manage inventory
    #[command(subcommand)]
    Product(ProductCommand),
    /// Register and inspect sales
    #[command(subcommand)]
    Sale(SaleCommand),
    /// Inspect, pay and delete debts
    #[command(subcommand)]
    Debt(DebtCommand),
    /// Recompute every client's debt total from the open debts
    Reconcile,
    /// Write a CSV report to stdout
    #[command(subcommand)]
    Export(ExportCommand),
    /// Show the audit log, newest first
    Audit {
        /// Only entries from this user
        #[arg(long)]
        user: Option<String>,
    },
    /// Audit entries that mention one record, newest first
    History {
        /// product, client, sale, debt, category or user
        entity: String,
        id: u32,
    },
    /// Manage product categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Manage user accounts
    #[command(subcommand)]
    User(UserCommand),
    /// Sales reports
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    Add {
        name: String,
    },
    Rename {
        name: String,
        new_name: String,
    },
    Delete {
        name: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Add {
        username: String,
        #[arg(long, env = "POS_LEDGER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "empleado")]
        role: Role,
    },
    /// Change a user's role
    Role {
        username: String,
        role: Role,
    },
    Activate {
        username: String,
    },
    Deactivate {
        username: String,
    },
    /// Set a new password
    Password {
        username: String,
        #[arg(long, env = "POS_LEDGER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Sales of one day (UTC), today by default
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Sales of one month
    Monthly {
        year: i32,
        month: u32,
    },
    /// Best-selling products by units
    Top {
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// A user as shown on the command line, without the password hash.
#[derive(Serialize, Debug)]
struct UserRow {
    id: UserId,
    username: String,
    rol: Role,
    activo: bool,
    created_at: DateTime<Utc>,
}

impl From<User> for UserRow {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            rol: user.role,
            activo: user.active,
            created_at: user.created_at,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    Add {
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    Edit {
        id: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Delete {
        id: u32,
    },
    List,
}

#[derive(Args, Debug)]
struct ProductArgs {
    name: String,
    #[arg(long)]
    price: Decimal,
    #[arg(long, default_value = "0")]
    quantity: Decimal,
    #[arg(long)]
    category: String,
}

impl ProductArgs {
    fn form(&self) -> ProductForm {
        ProductForm::new(&self.name, self.price, self.quantity, &self.category)
    }
}

#[derive(Subcommand, Debug)]
enum ProductCommand {
    Add(ProductArgs),
    Edit {
        id: u32,
        #[command(flatten)]
        fields: ProductArgs,
    },
    /// Add units to stock (negative to remove)
    Stock {
        id: u32,
        #[arg(allow_negative_numbers = true)]
        delta: Decimal,
    },
    Delete {
        id: u32,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum SaleCommand {
    Register {
        #[arg(long)]
        client: u32,
        /// PRODUCT:QUANTITY[:UNIT_PRICE], repeatable
        #[arg(long = "item", value_parser = parse_item, required = true)]
        items: Vec<SaleItem>,
        /// Amount collected; the full price when omitted, unless the payment is pending
        #[arg(long)]
        paid: Option<Decimal>,
        #[arg(long, default_value = "cash")]
        payment: PaymentType,
    },
    /// Set invoice fields of a sale
    Extras {
        id: u32,
        #[arg(long)]
        observations: Option<String>,
        #[arg(long)]
        seller: Option<String>,
        #[arg(long)]
        seller_phone: Option<String>,
        #[arg(long)]
        driver: Option<String>,
        #[arg(long)]
        plate: Option<String>,
    },
    Delete {
        id: u32,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum DebtCommand {
    List {
        #[arg(long)]
        client: Option<u32>,
    },
    /// Pay towards one line of a debt
    Pay {
        debt: u32,
        line: u32,
        amount: Decimal,
    },
    Delete {
        debt: u32,
    },
}

#[derive(Subcommand, Debug)]
enum ExportCommand {
    /// Clients with open debts
    Debtors,
    /// Every debt line with its debt's state
    DebtLines,
}

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("pos_ledger={}", settings.log_level))),
        )
        .with_writer(std::io::stderr)
        .init();

    let data_path = cli.data.clone().unwrap_or_else(|| settings.data_path.clone());
    let store = match Store::open(&data_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening ledger '{}': {}", data_path.display(), e);
            process::exit(1);
        }
    };
    let audit = JsonLinesAuditLog::new(&settings.audit_path);
    let engine = Engine::with_parts(store, Box::new(audit));
    let actor = Actor::new(cli.actor.clone().unwrap_or_else(|| settings.actor.clone()));

    if let Err(e) = run(&engine, &actor, cli.command, std::io::stdout()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run<W: Write>(
    engine: &Engine,
    actor: &Actor,
    command: Command,
    mut out: W,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Client(command) => match command {
            ClientCommand::Add { name, phone } => {
                print_json(&mut out, &engine.add_client(&name, &phone, actor)?)
            }
            ClientCommand::Edit { id, name, phone } => {
                let changes = ClientChanges { name, phone };
                print_json(&mut out, &engine.edit_client(ClientId(id), &changes, actor)?)
            }
            ClientCommand::Delete { id } => {
                print_json(&mut out, &engine.delete_client(ClientId(id), actor)?)
            }
            ClientCommand::List => print_json(&mut out, &engine.list_clients()),
        },
        Command::Product(command) => match command {
            ProductCommand::Add(fields) => {
                print_json(&mut out, &engine.add_product(&fields.form(), actor)?)
            }
            ProductCommand::Edit { id, fields } => print_json(
                &mut out,
                &engine.edit_product(ProductId(id), &fields.form(), actor)?,
            ),
            ProductCommand::Stock { id, delta } => {
                print_json(&mut out, &engine.adjust_stock(ProductId(id), delta, actor)?)
            }
            ProductCommand::Delete { id } => {
                print_json(&mut out, &engine.delete_product(ProductId(id), actor)?)
            }
            ProductCommand::List => print_json(&mut out, &engine.list_products()),
        },
        Command::Sale(command) => match command {
            SaleCommand::Register {
                client,
                items,
                paid,
                payment,
            } => {
                let paid = match (paid, payment) {
                    (Some(paid), _) => paid,
                    (None, PaymentType::Pending) => Decimal::ZERO,
                    (None, _) => full_price(engine, &items)?,
                };
                let new_sale = NewSale {
                    client_id: ClientId(client),
                    items,
                    paid,
                    payment_type: payment,
                };
                let receipt = engine.register_sale(&new_sale, actor)?;
                print_json(&mut out, &receipt.sale)?;
                if let Some(debt) = &receipt.debt {
                    print_json(&mut out, debt)?;
                }
                Ok(())
            }
            SaleCommand::Extras {
                id,
                observations,
                seller,
                seller_phone,
                driver,
                plate,
            } => {
                let changes = SaleExtras {
                    observations,
                    seller,
                    seller_phone,
                    driver,
                    plate,
                };
                print_json(&mut out, &engine.edit_sale_extras(SaleId(id), changes, actor)?)
            }
            SaleCommand::Delete { id } => {
                print_json(&mut out, &engine.delete_sale(SaleId(id), actor)?)
            }
            SaleCommand::List => print_json(&mut out, &engine.list_sales()),
        },
        Command::Debt(command) => match command {
            DebtCommand::List { client: Some(id) } => {
                print_json(&mut out, &engine.debts_by_client(ClientId(id)))
            }
            DebtCommand::List { client: None } => print_json(&mut out, &engine.list_debts()),
            DebtCommand::Pay { debt, line, amount } => print_json(
                &mut out,
                &engine.pay_line(DebtId(debt), DebtLineId(line), amount, actor)?,
            ),
            DebtCommand::Delete { debt } => {
                print_json(&mut out, &engine.delete_debt(DebtId(debt), actor)?)
            }
        },
        Command::Reconcile => {
            let corrections = engine.reconcile_debt_totals(actor)?;
            for c in &corrections {
                writeln!(out, "client {}: {} -> {}", c.client_id, c.cached, c.actual)?;
            }
            writeln!(out, "{} client(s) corrected", corrections.len())?;
            Ok(())
        }
        Command::Export(ExportCommand::Debtors) => write_csv(out, engine.debtors()),
        Command::Export(ExportCommand::DebtLines) => write_csv(out, engine.list_debt_lines()),
        Command::Audit { user } => {
            let entries = match user {
                Some(user) => engine.entries_by_actor(&Actor::new(user))?,
                None => {
                    let mut entries = engine.audit_entries()?;
                    entries.reverse();
                    entries
                }
            };
            print_json(&mut out, &entries)
        }
        Command::History { entity, id } => {
            let record = RecordRef::parse(&entity, id)?;
            print_json(&mut out, &engine.record_history(record)?)
        }
        Command::Category(command) => match command {
            CategoryCommand::Add { name } => print_json(&mut out, &engine.add_category(&name, actor)?),
            CategoryCommand::Rename { name, new_name } => {
                let category = engine
                    .find_category(&name)
                    .ok_or_else(|| format!("unknown category '{name}'"))?;
                print_json(&mut out, &engine.rename_category(category.id, &new_name, actor)?)
            }
            CategoryCommand::Delete { name } => {
                let category = engine
                    .find_category(&name)
                    .ok_or_else(|| format!("unknown category '{name}'"))?;
                print_json(&mut out, &engine.delete_category(category.id, actor)?)
            }
            CategoryCommand::List => print_json(&mut out, &engine.list_categories()),
        },
        Command::User(command) => {
            let user = match command {
                UserCommand::Add {
                    username,
                    password,
                    role,
                } => engine.create_user(&username, &password, role, actor)?,
                UserCommand::Role { username, role } => {
                    engine.change_role(user_id(engine, &username)?, role, actor)?
                }
                UserCommand::Activate { username } => {
                    engine.set_user_active(user_id(engine, &username)?, true, actor)?
                }
                UserCommand::Deactivate { username } => {
                    engine.set_user_active(user_id(engine, &username)?, false, actor)?
                }
                UserCommand::Password { username, password } => {
                    engine.change_password(user_id(engine, &username)?, &password, actor)?
                }
                UserCommand::List => {
                    let rows: Vec<UserRow> =
                        engine.list_users().into_iter().map(UserRow::from).collect();
                    return print_json(&mut out, &rows);
                }
            };
            print_json(&mut out, &UserRow::from(user))
        }
        Command::Report(command) => match command {
            ReportCommand::Daily { date } => {
                let date = date.unwrap_or_else(|| Utc::now().date_naive());
                print_json(&mut out, &engine.daily_sales(date, actor)?)
            }
            ReportCommand::Monthly { year, month } => {
                print_json(&mut out, &engine.monthly_sales(year, month, actor)?)
            }
            ReportCommand::Top { limit } => write_csv(out, engine.top_products(limit, actor)?),
        },
    }
}

fn user_id(engine: &Engine, username: &str) -> Result<UserId, String> {
    engine
        .find_user(username)
        .map(|user| user.id)
        .ok_or_else(|| format!("unknown user '{username}'"))
}

/// Parses `PRODUCT:QUANTITY[:UNIT_PRICE]`.
fn parse_item(value: &str) -> Result<SaleItem, String> {
    let mut parts = value.split(':').map(str::trim);
    let (Some(product), Some(quantity)) = (parts.next(), parts.next()) else {
        return Err(format!("expected PRODUCT:QUANTITY[:UNIT_PRICE], got '{value}'"));
    };
    let product: u32 = product
        .parse()
        .map_err(|e| format!("invalid product id '{product}': {e}"))?;
    let quantity: Decimal = quantity
        .parse()
        .map_err(|e| format!("invalid quantity '{quantity}': {e}"))?;
    let item = SaleItem::new(ProductId(product), quantity);
    let item = match parts.next() {
        Some(price) => item.at_price(
            price
                .parse()
                .map_err(|e| format!("invalid unit price '{price}': {e}"))?,
        ),
        None => item,
    };
    if parts.next().is_some() {
        return Err(format!("too many fields in '{value}'"));
    }
    Ok(item)
}

/// Full price of the items, using list prices where no price was given.
/// Unknown products count as zero; registration rejects them anyway.
fn full_price(engine: &Engine, items: &[SaleItem]) -> Result<Decimal, LedgerError> {
    let amounts = items
        .iter()
        .map(|item| {
            let price = item
                .unit_price
                .or_else(|| engine.get_product(item.product_id).map(|p| p.price))
                .unwrap_or(Decimal::ZERO);
            line_amount(item.quantity, price)
        })
        .collect::<Result<Vec<_>, _>>()?;
    checked_total(amounts)
}

fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), Box<dyn Error>> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Writes one CSV row per record, with a header.
fn write_csv<W: Write, T: Serialize>(writer: W, rows: Vec<T>) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
