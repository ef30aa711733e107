use std::{fs, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use battery_scm::{
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::{OrderKind, OrderStatus},
    errors::ServiceError,
    services::{
        catalog::{CatalogReader, CatalogService, NewItem},
        orders::{OrderDetails, OrderFilter, OrderService},
        order_numbers::OrderNumberSettings,
        receiving::ReceivingService,
        shipping::ShippingService,
    },
};
use clap::{ArgAction, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Items(command) => handle_items_command(&context, command, cli.json).await?,
        Commands::Orders(command) => handle_orders_command(&context, command, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "scm-cli", about = "Battery SCM operator CLI", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    #[command(subcommand)]
    Items(ItemsCommands),
    #[command(subcommand)]
    Orders(OrdersCommands),
}

#[derive(Subcommand)]
enum ItemsCommands {
    /// List active catalog items
    List,
    /// Add one catalog item
    Add {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0)]
        lead_time_days: i32,
        #[arg(long)]
        price: String,
    },
    /// Seed the catalog from a JSON array of items; existing codes are skipped
    Seed {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum OrdersCommands {
    /// List orders, newest first
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        customer: Option<String>,
    },
    /// Show an order with its lines
    Show { order_no: String },
    /// Per-line received / planned / shipped / available figures
    Availability { order_no: String },
    /// Receipts recorded against an order
    Receipts { order_no: String },
    /// Orders still waiting for goods
    AwaitingReceipt,
    /// Orders fully received and ready for shipping plans
    ReadyForPlanning,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }

    fn catalog(&self) -> Arc<CatalogService> {
        Arc::new(CatalogService::new(self.db.clone()))
    }

    fn order_service(&self) -> OrderService {
        OrderService::new(
            self.db.clone(),
            self.catalog(),
            None,
            OrderNumberSettings::from(&self.config),
        )
    }

    fn receiving_service(&self) -> ReceivingService {
        ReceivingService::new(self.db.clone(), None)
    }

    fn shipping_service(&self) -> ShippingService {
        ShippingService::new(self.db.clone(), None)
    }
}

async fn handle_items_command(context: &CliContext, command: ItemsCommands, json: bool) -> Result<()> {
    let catalog = context.catalog();
    match command {
        ItemsCommands::List => {
            let items = catalog.list_active_items().await?;
            if json {
                return print_json(&items);
            }
            for item in &items {
                println!(
                    "- {} • {} • lead time {}d • {}",
                    item.item_code, item.item_name, item.lead_time_days, item.unit_price
                );
            }
            println!("{} active items", items.len());
        }
        ItemsCommands::Add {
            code,
            name,
            lead_time_days,
            price,
        } => {
            let unit_price = Decimal::from_str(&price)
                .map_err(|e| anyhow!("invalid price '{}': {}", price, e))?;
            let item = catalog
                .create_item(NewItem {
                    item_code: code,
                    item_name: name,
                    lead_time_days,
                    unit_price,
                })
                .await?;
            if json {
                return print_json(&item);
            }
            println!("Added item {} ({})", item.item_code, item.item_name);
        }
        ItemsCommands::Seed { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let items: Vec<NewItem> =
                serde_json::from_str(&raw).context("seed file must be a JSON array of items")?;
            let (mut added, mut skipped) = (0usize, 0usize);
            for item in items {
                let code = item.item_code.clone();
                match catalog.create_item(item).await {
                    Ok(_) => added += 1,
                    Err(ServiceError::Conflict(msg)) => {
                        skipped += 1;
                        eprintln!("skipping {}: {}", code, msg);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            println!("Seeded {} items ({} skipped)", added, skipped);
        }
    }
    Ok(())
}

async fn handle_orders_command(
    context: &CliContext,
    command: OrdersCommands,
    json: bool,
) -> Result<()> {
    match command {
        OrdersCommands::List {
            status,
            kind,
            customer,
        } => {
            let filter = OrderFilter {
                status: status.as_deref().map(parse_status).transpose()?,
                order_kind: kind.as_deref().map(parse_kind).transpose()?,
                customer_name: customer,
                ..Default::default()
            };
            let orders = context.order_service().list_orders(filter).await?;
            if json {
                return print_json(&orders);
            }
            for order in &orders {
                println!(
                    "- {} • {} • {} • {} • priority {}",
                    order.order_no, order.order_date, order.customer_name, order.status, order.priority
                );
            }
            println!("{} orders", orders.len());
        }
        OrdersCommands::Show { order_no } => {
            let details = context.order_service().get_order_details(&order_no).await?;
            if json {
                return print_json(&details);
            }
            render_details(&details);
        }
        OrdersCommands::Availability { order_no } => {
            let lines = context
                .shipping_service()
                .get_order_availability(&order_no)
                .await?;
            if json {
                return print_json(&lines);
            }
            for line in &lines {
                let inv = &line.inventory;
                println!(
                    "  #{} {} ordered {} • received {} • planned {} • shipped {} • available {}",
                    line.line_seq,
                    line.item_code,
                    line.ordered,
                    inv.received,
                    inv.planned,
                    inv.shipped,
                    inv.available
                );
            }
        }
        OrdersCommands::Receipts { order_no } => {
            let receipts = context
                .receiving_service()
                .get_receipt_history(&order_no)
                .await?;
            if json {
                return print_json(&receipts);
            }
            for r in &receipts {
                println!(
                    "- #{} line {} • {} × {} • {} by {}",
                    r.receipt_id, r.line_seq, r.item_code, r.received_qty, r.received_date, r.received_by
                );
            }
        }
        OrdersCommands::AwaitingReceipt => {
            let orders = context.receiving_service().orders_awaiting_receipt().await?;
            if json {
                return print_json(&orders);
            }
            for order in &orders {
                println!("- {} • {} • {}", order.order_no, order.customer_name, order.status);
            }
        }
        OrdersCommands::ReadyForPlanning => {
            let orders = context.shipping_service().orders_ready_for_planning().await?;
            if json {
                return print_json(&orders);
            }
            for order in &orders {
                println!("- {} • {} • priority {}", order.order_no, order.customer_name, order.priority);
            }
        }
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::from_str(raw).map_err(|_| anyhow!("unknown order status '{}'", raw))
}

fn parse_kind(raw: &str) -> Result<OrderKind> {
    OrderKind::from_str(raw).map_err(|_| anyhow!("unknown order kind '{}'", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_details(details: &OrderDetails) {
    let order = &details.order;
    println!(
        "Order {} • {} • {} • {} • priority {}",
        order.order_no, order.order_kind, order.customer_name, order.status, order.priority
    );
    for line in &details.lines {
        println!(
            "  #{} {} {} × {} @ {} • shipped {}",
            line.line_seq, line.item_code, line.item_name, line.ordered_qty, line.unit_price, line.shipped_qty
        );
    }
    println!("Total {}", details.total_amount);
}
