use std::{alloc::Layout, io::Read, ptr};

use tieralloc::{BrkGrower, Heap, HeapConfig, Reclaimer, program_break};

/// Waits until the user presses ENTER, unless `--no-wait` was given.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed(
  wait: bool,
) {
  if !wait {
    return;
  }

  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break.
fn print_program_break(
  label: &str,
) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    program_break(),
  );
}

fn print_alloc(
  heap: &Heap<BrkGrower>,
  layout: Layout,
  addr: *mut u8,
) {
  let viewer = heap.viewer();

  println!(
    "Allocated {} bytes, address = {:?}, in use = {}, requested = {}, blocks = {}",
    layout.size(),
    addr,
    viewer.memory_used_size(),
    viewer.memory_requested_size(),
    viewer.block_number(),
  );
}

fn main() {
  let wait = !std::env::args().any(|arg| arg == "--no-wait");

  // Small blocks grow the program break directly. Nothing else in this
  // demo moves it concurrently.
  let mut heap = Heap::with_grower(unsafe { BrkGrower::new() }, HeapConfig::default());

  unsafe {
    print_program_break("start");
    block_until_enter_pressed(wait);

    // --------------------------------------------------------------------
    // 1) Allocate space for a u32. The footprint is the aligned payload plus
    //    a two-word header.
    // --------------------------------------------------------------------
    let layout_u32 = Layout::new::<u32>();
    let first_block = heap.allocate(layout_u32.size());
    println!("\n[1] Allocate u32");
    print_alloc(&heap, layout_u32, first_block);

    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    block_until_enter_pressed(wait);

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes, rounded up to a whole number of words.
    // --------------------------------------------------------------------
    let layout_12_bytes = Layout::array::<u8>(12).unwrap();
    let second_block = heap.allocate(layout_12_bytes.size());
    println!("\n[2] Allocate [u8; 12]");
    print_alloc(&heap, layout_12_bytes, second_block);

    ptr::write_bytes(second_block, 0xAB, layout_12_bytes.size());
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed(wait);

    // --------------------------------------------------------------------
    // 3) Deallocate the first block. It stays chained, only marked free.
    // --------------------------------------------------------------------
    heap.deallocate(first_block, 1);
    println!("\n[3] Deallocated first_block at {:?}", first_block);
    print_program_break("after free");
    block_until_enter_pressed(wait);

    // --------------------------------------------------------------------
    // 4) Allocate 2 bytes. Same footprint as the u32, so the freed block is
    //    reused.
    // --------------------------------------------------------------------
    let layout_2_bytes = Layout::array::<u8>(2).unwrap();
    let third_block = heap.allocate(layout_2_bytes.size());
    println!("\n[4] Allocate [u8; 2] (check reuse of freed block)");
    print_alloc(&heap, layout_2_bytes, third_block);

    println!(
      "[4] third_block == first_block? {}",
      if third_block == first_block {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    block_until_enter_pressed(wait);

    // --------------------------------------------------------------------
    // 5) Free a 64 byte request and ask for 8 bytes: the free block is more
    //    than twice the footprint, so a new block is acquired instead.
    // --------------------------------------------------------------------
    let wide = heap.allocate(64);
    heap.deallocate(wide, 1);
    let narrow = heap.allocate(8);
    println!(
      "\n[5] 8 byte request after freeing 64 bytes: reused = {}, blocks = {}",
      narrow == wide,
      heap.viewer().block_number()
    );

    block_until_enter_pressed(wait);

    // --------------------------------------------------------------------
    // 6) Allocate a 256 KiB block. It is mapped on its own and the program
    //    break does not move.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    let layout_big = Layout::array::<u8>(256 * 1024).unwrap();
    let big_block = heap.allocate(layout_big.size());
    println!("\n[6] Allocate large 256 KiB block");
    print_alloc(&heap, layout_big, big_block);

    print_program_break("after large alloc");

    heap.deallocate(big_block, 1);
    println!(
      "[6] Released large block, requested = {}",
      heap.viewer().memory_requested_size()
    );

    block_until_enter_pressed(wait);

    // --------------------------------------------------------------------
    // 7) Free everything and merge neighbors.
    // --------------------------------------------------------------------
    heap.deallocate(second_block, 1);
    heap.deallocate(third_block, 1);
    heap.deallocate(narrow, 1);

    let merged = Reclaimer::new(heap.manager_mut()).run();
    println!(
      "\n[7] Reclaimer merged {} blocks, {} left in the chain, chain safe = {}",
      merged,
      heap.viewer().block_number(),
      heap.viewer().safe_check()
    );

    println!("\n[8] End of example. Process will exit and the OS will reclaim all memory.");
  }
}
