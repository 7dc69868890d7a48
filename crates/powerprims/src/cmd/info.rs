use powerprims_hw::cpufreq::CpuFreq;
use powerprims_hw::energy::Energy;
use powerprims_hw::topology::{CpuId, Topology, VirtualCoreId};
use powerprims_hw::{cpufreq, energy, topology, HwError};
use serde::Serialize;
use tracing::debug;

use crate::cmd::InfoArgs;
use crate::exit::{hw_error, rpc_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{compact_list, print_json, table, OutputFormat};

#[derive(Serialize)]
struct CpuOutput {
    cpu: CpuId,
    vendor_id: Option<String>,
    family: Option<String>,
    model: Option<String>,
    physical_cores: usize,
    virtual_cores: Vec<VirtualCoreId>,
}

#[derive(Serialize)]
struct DomainOutput {
    id: u32,
    virtual_cores: Vec<VirtualCoreId>,
    governor: Option<String>,
    frequency_khz: Option<u32>,
    /// `None` when the voltage cannot be read.
    voltage: Option<f64>,
    available_frequencies: usize,
}

#[derive(Serialize)]
struct EnergyOutput {
    cpus: Vec<CpuId>,
    cores: bool,
    graphic: bool,
    dram: bool,
}

#[derive(Serialize)]
struct InfoOutput {
    source: String,
    cpus: Vec<CpuOutput>,
    virtual_cores: usize,
    cpufreq: Option<Vec<DomainOutput>>,
    boosting: Option<bool>,
    energy: Option<EnergyOutput>,
}

struct Facades {
    topology: Box<dyn Topology>,
    cpufreq: Option<Box<dyn CpuFreq>>,
    energy: Option<Box<dyn Energy>>,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let (source, facades) = if args.local {
        let config = args.sysfs.config();
        let facades = Facades {
            topology: topology::local(&config)
                .map_err(|err| hw_error("topology unavailable", err))?,
            cpufreq: optional("cpufreq", cpufreq::local(&config))?,
            energy: optional("energy", energy::local(&config))?,
        };
        (format!("local:{}", config.root().display()), facades)
    } else {
        let addr = args
            .addr
            .as_deref()
            .ok_or_else(|| CliError::new(USAGE, "an address or --local is required"))?;
        let channel =
            powerprims_rpc::connect(addr).map_err(|err| rpc_error("connect failed", err))?;
        let facades = Facades {
            topology: topology::remote(channel.clone())
                .map_err(|err| hw_error("topology unavailable", err))?,
            cpufreq: optional("cpufreq", cpufreq::remote(channel.clone()))?,
            energy: optional("energy", energy::remote(channel))?,
        };
        (addr.to_string(), facades)
    };

    let out = collect(source, &facades);
    release(facades);
    print_info(&out, format);
    Ok(SUCCESS)
}

/// A module the machine does not offer is skipped; a broken channel is not.
fn optional<T>(module: &str, result: powerprims_hw::Result<T>) -> CliResult<Option<T>> {
    match result {
        Ok(facade) => Ok(Some(facade)),
        Err(HwError::Rpc(err)) if err.is_fatal() => Err(rpc_error(module, err)),
        Err(err) => {
            debug!(module, error = %err, "module unavailable");
            Ok(None)
        }
    }
}

fn collect(source: String, facades: &Facades) -> InfoOutput {
    let layout = facades.topology.layout();
    let cpus = layout
        .cpus()
        .into_iter()
        .map(|cpu| CpuOutput {
            cpu,
            vendor_id: facades.topology.cpu_vendor_id(cpu).ok(),
            family: facades.topology.cpu_family(cpu).ok(),
            model: facades.topology.cpu_model(cpu).ok(),
            physical_cores: layout.physical_cores(cpu).len(),
            virtual_cores: layout.virtual_cores_of_cpu(cpu),
        })
        .collect();

    let domains = facades.cpufreq.as_ref().map(|freq| {
        freq.domains()
            .iter()
            .map(|domain| DomainOutput {
                id: domain.id,
                virtual_cores: domain.virtual_cores.clone(),
                governor: freq
                    .current_governor(domain.id)
                    .ok()
                    .flatten()
                    .map(|governor| governor.to_string()),
                frequency_khz: freq.current_frequency(domain.id).ok(),
                voltage: freq
                    .current_voltage(domain.id)
                    .ok()
                    .filter(|&volts| volts > 0.0),
                available_frequencies: freq
                    .available_frequencies(domain.id)
                    .map(|f| f.len())
                    .unwrap_or(0),
            })
            .collect()
    });

    InfoOutput {
        source,
        cpus,
        virtual_cores: layout.virtual_cores().len(),
        cpufreq: domains,
        boosting: facades
            .cpufreq
            .as_ref()
            .and_then(|freq| freq.is_boosting_enabled().ok()),
        energy: facades.energy.as_ref().map(|energy| EnergyOutput {
            cpus: energy.cpus().to_vec(),
            cores: energy.has_joules_cores(),
            graphic: energy.has_joules_graphic(),
            dram: energy.has_joules_dram(),
        }),
    }
}

fn release(facades: Facades) {
    if let Some(energy) = facades.energy {
        energy::release(energy);
    }
    if let Some(freq) = facades.cpufreq {
        cpufreq::release(freq);
    }
    topology::release(facades.topology);
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut cpus = table(vec!["CPU", "VENDOR", "FAMILY", "MODEL", "CORES", "VIRTUAL CORES"]);
            for cpu in &out.cpus {
                cpus.add_row(vec![
                    cpu.cpu.to_string(),
                    cpu.vendor_id.clone().unwrap_or_default(),
                    cpu.family.clone().unwrap_or_default(),
                    cpu.model.clone().unwrap_or_default(),
                    cpu.physical_cores.to_string(),
                    compact_list(&cpu.virtual_cores),
                ]);
            }
            println!("{cpus}");

            if let Some(domains) = &out.cpufreq {
                let mut freq = table(vec![
                    "DOMAIN",
                    "VIRTUAL CORES",
                    "GOVERNOR",
                    "FREQUENCY (kHz)",
                    "VOLTAGE (V)",
                ]);
                for domain in domains {
                    freq.add_row(vec![
                        domain.id.to_string(),
                        compact_list(&domain.virtual_cores),
                        domain.governor.clone().unwrap_or_else(|| "-".to_string()),
                        domain
                            .frequency_khz
                            .map(|f| f.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        domain
                            .voltage
                            .map(|v| format!("{v:.3}"))
                            .unwrap_or_else(|| "-".to_string()),
                    ]);
                }
                println!("{freq}");
            }
        }
        OutputFormat::Pretty => {
            println!("Machine: {}", out.source);
            println!("  Virtual cores:   {}", out.virtual_cores);
            for cpu in &out.cpus {
                println!(
                    "  CPU {}: {} family {} model {} ({} cores, vcs {})",
                    cpu.cpu,
                    cpu.vendor_id.as_deref().unwrap_or("?"),
                    cpu.family.as_deref().unwrap_or("?"),
                    cpu.model.as_deref().unwrap_or("?"),
                    cpu.physical_cores,
                    compact_list(&cpu.virtual_cores)
                );
            }
            match &out.cpufreq {
                Some(domains) => println!("  Freq domains:    {}", domains.len()),
                None => println!("  Freq domains:    unavailable"),
            }
            match &out.energy {
                Some(energy) => println!("  Energy counters: cpus {}", compact_list(&energy.cpus)),
                None => println!("  Energy counters: unavailable"),
            }
        }
        OutputFormat::Raw => {
            let vcs: Vec<VirtualCoreId> = out
                .cpus
                .iter()
                .flat_map(|cpu| cpu.virtual_cores.iter().copied())
                .collect();
            println!("{}", compact_list(&vcs));
        }
    }
}
